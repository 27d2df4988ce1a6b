use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use simkern::*;

/// Workers take one unit from a shared bin and occupy a single machine for a while.
/// A supplier refills the bin periodically.
struct Worker {
    machine: ResourceId,
    bin: ContainerId,
    work: Duration,
    stage: Stage,
    finished: Key<Vec<(usize, Duration)>>,
    id: usize,
}

enum Stage {
    Start,
    Queued(Request),
    Fetching(Request),
    Working(Request),
}

impl Process for Worker {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Suspend {
        match self.stage {
            Stage::Start => {
                let request = ctx.request(self.machine);
                self.stage = Stage::Queued(request);
                Suspend::Wait(request.signal())
            }
            Stage::Queued(request) => {
                self.stage = Stage::Fetching(request);
                Suspend::Wait(ctx.get(self.bin, 1))
            }
            Stage::Fetching(request) => {
                self.stage = Stage::Working(request);
                Suspend::Wait(ctx.timeout(self.work))
            }
            Stage::Working(request) => {
                ctx.release(request);
                let time = ctx.time();
                ctx.state_mut()
                    .get_mut(self.finished)
                    .expect("missing log")
                    .push((self.id, time));
                Suspend::Exit
            }
        }
    }
}

fn run(workers: usize) -> (Vec<(usize, Duration)>, u64) {
    let mut sim = Simulation::default();
    let machine = sim.add_resource(1);
    let bin = sim.add_container(2);
    let finished = sim.state.insert(Vec::new());
    for id in 0..workers {
        sim.spawn(Worker {
            machine,
            bin,
            work: Duration::from_secs(3),
            stage: Stage::Start,
            finished,
            id,
        });
    }
    let refills = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&refills);
    sim.spawn(from_fn(move |ctx| {
        if ctx.time() > Duration::default() {
            ctx.put(bin, 1);
            *counter.borrow_mut() += 1;
        }
        Suspend::Wait(ctx.timeout(Duration::from_secs(10)))
    }));
    sim.run_until(Duration::from_secs(100));
    assert_eq!(sim.resource(machine).capacity(), 1);
    let log = sim.state.remove(finished).unwrap();
    let events = sim.events_processed();
    assert!(*refills.borrow() > 0);
    (log, events)
}

#[test]
fn test_bin_limits_throughput() {
    let (log, _) = run(5);
    let times: Vec<_> = log.iter().map(|(_, t)| t.as_secs()).collect();
    // Two units in stock, then one unit every 10 seconds.
    assert_eq!(times, vec![3, 6, 13, 23, 33]);
    let ids: Vec<_> = log.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_deterministic_replay() {
    assert_eq!(run(8), run(8));
}
