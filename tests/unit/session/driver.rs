use super::*;
use crate::host::sim::SimHost;
use crate::scene::project::Project;

struct Countdown {
    left: u32,
    ticks: u32,
    cancelled: bool,
}

impl Countdown {
    fn new(left: u32) -> Self {
        Self {
            left,
            ticks: 0,
            cancelled: false,
        }
    }
}

impl BakeTask for Countdown {
    fn tick(
        &mut self,
        _host: &mut dyn Host,
        _ctx: &OrchestratorContext,
        event: LoopEvent,
    ) -> BakeResult<TickStatus> {
        assert_eq!(event, LoopEvent::Timer);
        self.ticks += 1;
        if self.left == 0 {
            return Ok(TickStatus::Finished);
        }
        self.left -= 1;
        Ok(TickStatus::Running)
    }

    fn cancel(&mut self, _host: &mut dyn Host, _ctx: &OrchestratorContext) {
        self.cancelled = true;
    }
}

#[test]
fn drives_until_the_task_stops() {
    let mut host = SimHost::new(Project::default());
    let ctx = OrchestratorContext::default();
    let mut task = Countdown::new(3);
    let status = drive(&mut host, &ctx, &mut task, None).unwrap();
    assert_eq!(status, TickStatus::Finished);
    assert_eq!(task.ticks, 4);
    assert!(!task.cancelled);
}

#[test]
fn tick_limit_cancels_the_task() {
    let mut host = SimHost::new(Project::default());
    let ctx = OrchestratorContext::default();
    let mut task = Countdown::new(100);
    let err = drive(&mut host, &ctx, &mut task, Some(5)).unwrap_err();
    assert!(matches!(err, BakeError::Host(_)));
    assert!(err.to_string().contains("5 ticks"));
    assert_eq!(task.ticks, 5);
    assert!(task.cancelled);
}

#[test]
fn only_running_is_not_done() {
    assert!(!TickStatus::Running.is_done());
    assert!(TickStatus::Finished.is_done());
    assert!(TickStatus::Cancelled.is_done());
}
