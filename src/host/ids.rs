slotmap::new_key_type! {
    /// Host object (mesh) handle.
    pub struct ObjectId;
    /// Host material handle.
    pub struct MaterialId;
    /// Shading node handle, unique across all materials.
    pub struct NodeId;
    /// Host image datablock handle.
    pub struct ImageId;
    /// Host scene handle.
    pub struct SceneId;
    /// Host collection handle.
    pub struct CollectionId;
}
