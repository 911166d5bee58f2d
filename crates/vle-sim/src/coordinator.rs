//! Root coordinator: drives the atomic models of a coupled model.
//!
//! One call to [`Coordinator::step`] processes one simulation instant:
//!
//! 1. collect the imminent models (next event time equal to the current time)
//! 2. gather their outputs and route them through the couplings
//! 3. apply internal, external or confluent transitions, one batch per model
//! 4. reschedule every model that transitioned

use tracing::{debug, trace};
use vle_core::{ExternalEvent, INFINITY, ModelId, Time};

use crate::coupled::Coupled;
use crate::error::{SimError, SimResult};
use crate::view::{ObservationTable, View};

/// Options for simulation runs.
#[derive(Clone, Debug)]
pub struct SimOptions {
    /// Simulation start time
    pub begin: Time,
    /// Simulated duration, the run stops after `begin + duration`
    pub duration: Time,
    /// Maximum number of simulation instants (safety limit against
    /// zero time-advance cycles)
    pub max_steps: usize,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            begin: 0.0,
            duration: 1.0,
            max_steps: 10_000_000,
        }
    }
}

impl SimOptions {
    pub fn validate(&self) -> SimResult<()> {
        if !self.begin.is_finite() {
            return Err(SimError::InvalidArg {
                what: "begin must be finite",
            });
        }
        if self.duration < 0.0 || !self.duration.is_finite() {
            return Err(SimError::InvalidArg {
                what: "duration must be a non-negative finite number",
            });
        }
        if self.max_steps == 0 {
            return Err(SimError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        Ok(())
    }

    pub fn end(&self) -> Time {
        self.begin + self.duration
    }
}

/// Sequential DEVS root coordinator.
#[derive(Debug)]
pub struct Coordinator {
    coupled: Coupled,
    views: Vec<View>,
    /// Time of next event per model.
    tn: Vec<Time>,
    time: Time,
    steps: usize,
}

impl Coordinator {
    pub fn new(coupled: Coupled) -> Self {
        let n = coupled.len();
        Self {
            coupled,
            views: Vec::new(),
            tn: vec![INFINITY; n],
            time: 0.0,
            steps: 0,
        }
    }

    /// Attach a view; its observables must name models of the coupled model.
    pub fn add_view(&mut self, mut view: View) -> SimResult<()> {
        view.resolve(&self.coupled)?;
        self.views.push(view);
        Ok(())
    }

    pub fn coupled(&self) -> &Coupled {
        &self.coupled
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn into_tables(self) -> Vec<ObservationTable> {
        self.views.into_iter().map(View::into_table).collect()
    }

    /// Time of the last processed instant.
    pub fn time(&self) -> Time {
        self.time
    }

    /// Number of processed instants since `init`.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Initialise every model at `begin`.
    pub fn init(&mut self, begin: Time) -> SimResult<()> {
        for (i, atomic) in self.coupled.models.iter_mut().enumerate() {
            let ta = atomic
                .dynamics
                .init(begin)
                .map_err(|e| SimError::model(&atomic.name, e))?;
            self.tn[i] = begin + ta;
        }
        for view in &mut self.views {
            view.start(begin);
        }
        self.time = begin;
        self.steps = 0;
        debug!(models = self.coupled.len(), begin, "coordinator initialised");
        Ok(())
    }

    /// Time of the next event, `INFINITY` when every model is passive.
    pub fn next_time(&self) -> Time {
        self.tn.iter().copied().fold(INFINITY, Time::min)
    }

    /// Process every event of the next simulation instant and return its time.
    pub fn step(&mut self) -> SimResult<Time> {
        let t = self.next_time();
        if t == INFINITY {
            return Ok(t);
        }
        let n = self.coupled.len();
        let imminent: Vec<bool> = self.tn.iter().map(|&tn| tn == t).collect();

        let mut bags: Vec<Vec<ExternalEvent>> = vec![Vec::new(); n];
        let mut out = Vec::new();
        for i in (0..n).filter(|&i| imminent[i]) {
            let atomic = &self.coupled.models[i];
            out.clear();
            atomic
                .dynamics
                .output(t, &mut out)
                .map_err(|e| SimError::model(&atomic.name, e))?;
            let from = ModelId::from_index(i as u32);
            for ev in &out {
                for (to, port) in self.coupled.routes(from, &ev.port) {
                    bags[to.slot()].push(ExternalEvent {
                        port: port.to_string(),
                        payload: ev.payload,
                    });
                }
            }
        }

        for (i, bag) in bags.iter().enumerate() {
            if !imminent[i] && bag.is_empty() {
                continue;
            }
            let atomic = &mut self.coupled.models[i];
            let result = match (imminent[i], bag.is_empty()) {
                (true, true) => atomic.dynamics.internal_transition(t),
                (true, false) => atomic.dynamics.confluent_transitions(t, bag),
                _ => atomic.dynamics.external_transition(bag, t),
            };
            result.map_err(|e| SimError::model(&atomic.name, e))?;
            trace!(
                time = t,
                model = %atomic.name,
                imminent = imminent[i],
                events = bag.len(),
                "transition"
            );
            self.tn[i] = t + atomic.dynamics.time_advance();
        }

        self.time = t;
        self.steps += 1;
        Ok(t)
    }

    /// Initialise and run until `begin + duration`, recording views.
    pub fn run(&mut self, opts: &SimOptions) -> SimResult<()> {
        opts.validate()?;
        let end = opts.end();
        self.init(opts.begin)?;
        loop {
            let next = self.next_time();
            for view in &mut self.views {
                view.observe_until(&self.coupled, next, end);
            }
            if next > end {
                break;
            }
            if self.steps >= opts.max_steps {
                return Err(SimError::StepLimit {
                    steps: self.steps,
                    time: self.time,
                });
            }
            self.step()?;
        }
        for atomic in &mut self.coupled.models {
            atomic.dynamics.finish();
        }
        debug!(steps = self.steps, end, "simulation finished");
        Ok(())
    }
}

/// Run a coupled model with the given views and return their tables.
pub fn run_sim(
    coupled: Coupled,
    views: Vec<View>,
    opts: &SimOptions,
) -> SimResult<Vec<ObservationTable>> {
    let mut coordinator = Coordinator::new(coupled);
    for view in views {
        coordinator.add_view(view)?;
    }
    coordinator.run(opts)?;
    Ok(coordinator.into_tables())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupled::CoupledBuilder;
    use proptest::prelude::*;
    use vle_core::{DevsResult, Dynamics, ModelContext, ObservationEvent, Payload};

    /// Emits an increasing counter on `out` every `period`.
    struct Ticker {
        ctx: ModelContext,
        period: Time,
        count: f64,
    }

    impl Dynamics for Ticker {
        fn context(&self) -> &ModelContext {
            &self.ctx
        }
        fn init(&mut self, _time: Time) -> DevsResult<Time> {
            Ok(self.period)
        }
        fn output(&self, _time: Time, output: &mut Vec<ExternalEvent>) -> DevsResult<()> {
            output.push(ExternalEvent::new("out", self.count + 1.0));
            Ok(())
        }
        fn time_advance(&self) -> Time {
            self.period
        }
        fn internal_transition(&mut self, _time: Time) -> DevsResult<()> {
            self.count += 1.0;
            Ok(())
        }
        fn external_transition(&mut self, _events: &[ExternalEvent], _time: Time) -> DevsResult<()> {
            Ok(())
        }
        fn observation(&self, _event: &ObservationEvent) -> Option<Payload> {
            Some(Payload::Scalar(self.count))
        }
    }

    /// Sums what it receives; records how it was woken.
    #[derive(Default)]
    struct Sink {
        ctx: ModelContext,
        total: f64,
        externals: usize,
    }

    impl Dynamics for Sink {
        fn context(&self) -> &ModelContext {
            &self.ctx
        }
        fn init(&mut self, _time: Time) -> DevsResult<Time> {
            Ok(INFINITY)
        }
        fn output(&self, _time: Time, _output: &mut Vec<ExternalEvent>) -> DevsResult<()> {
            Ok(())
        }
        fn time_advance(&self) -> Time {
            INFINITY
        }
        fn internal_transition(&mut self, _time: Time) -> DevsResult<()> {
            Ok(())
        }
        fn external_transition(&mut self, events: &[ExternalEvent], _time: Time) -> DevsResult<()> {
            self.externals += 1;
            self.total += events.iter().map(|e| e.payload.value()).sum::<f64>();
            Ok(())
        }
        fn observation(&self, _event: &ObservationEvent) -> Option<Payload> {
            Some(Payload::Scalar(self.total))
        }
    }

    fn ticker(name: &str, period: Time) -> Box<dyn Dynamics> {
        Box::new(Ticker {
            ctx: ModelContext::new(name).with_output_port("out"),
            period,
            count: 0.0,
        })
    }

    fn sink() -> Box<dyn Dynamics> {
        Box::new(Sink {
            ctx: ModelContext::new("sink").with_input_port("in"),
            ..Sink::default()
        })
    }

    #[test]
    fn routes_outputs_and_batches_simultaneous_events() {
        let mut b = CoupledBuilder::new();
        b.add_model(ticker("a", 1.0)).unwrap();
        b.add_model(ticker("b", 1.0)).unwrap();
        b.add_model(sink()).unwrap();
        b.connect("a", "out", "sink", "in").unwrap();
        b.connect("b", "out", "sink", "in").unwrap();
        let mut c = Coordinator::new(b.build().unwrap());
        c.add_view(View::new("v", 1.0).unwrap().observe("sink", "in"))
            .unwrap();

        c.run(&SimOptions {
            duration: 3.0,
            ..SimOptions::default()
        })
        .unwrap();

        let table = c.views()[0].table();
        assert_eq!(table.time, vec![0.0, 1.0, 2.0, 3.0]);
        // both tickers fire at 1, 2, 3: 2 + 4 + 6
        assert_eq!(table.column("sink:in").unwrap(), vec![
            Some(0.0),
            Some(2.0),
            Some(6.0),
            Some(12.0)
        ]);
        assert_eq!(c.steps(), 3);
    }

    #[test]
    fn one_external_batch_per_instant() {
        let mut b = CoupledBuilder::new();
        b.add_model(ticker("a", 0.5)).unwrap();
        b.add_model(ticker("b", 0.5)).unwrap();
        b.add_model(sink()).unwrap();
        b.connect("a", "out", "sink", "in").unwrap();
        b.connect("b", "out", "sink", "in").unwrap();
        let mut c = Coordinator::new(b.build().unwrap());
        c.init(0.0).unwrap();
        assert_eq!(c.next_time(), 0.5);
        assert_eq!(c.step().unwrap(), 0.5);
        assert_eq!(c.step().unwrap(), 1.0);
        let sink = c.coupled().find("sink").unwrap();
        let total = c
            .coupled()
            .model(sink)
            .observation(&ObservationEvent::new(1.0, "in"))
            .unwrap();
        assert_eq!(total.value(), 6.0);
    }

    #[test]
    fn step_limit_guards_runaway_runs() {
        let mut b = CoupledBuilder::new();
        b.add_model(ticker("a", 0.0)).unwrap();
        let mut c = Coordinator::new(b.build().unwrap());
        let err = c
            .run(&SimOptions {
                max_steps: 10,
                ..SimOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, SimError::StepLimit { steps: 10, .. }));
    }

    #[test]
    fn passive_models_end_the_run() {
        let mut b = CoupledBuilder::new();
        b.add_model(sink()).unwrap();
        let views = vec![View::new("v", 0.25).unwrap().observe("sink", "in")];
        let tables = run_sim(b.build().unwrap(), views, &SimOptions::default()).unwrap();
        assert_eq!(tables[0].len(), 5);
        assert_eq!(tables[0].get(4, "sink:in"), Some(0.0));
    }

    #[test]
    fn invalid_options() {
        let opts = SimOptions {
            duration: -1.0,
            ..SimOptions::default()
        };
        assert!(opts.validate().is_err());
        let opts = SimOptions {
            max_steps: 0,
            ..SimOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn view_on_unknown_model() {
        let mut b = CoupledBuilder::new();
        b.add_model(sink()).unwrap();
        let mut c = Coordinator::new(b.build().unwrap());
        let err = c
            .add_view(View::new("v", 1.0).unwrap().observe("ghost", "x"))
            .unwrap_err();
        assert!(matches!(err, SimError::UnknownModel { .. }));
    }

    proptest! {
        #[test]
        fn view_rows_cover_the_run(timestep in 0.01f64..1.0, duration in 0.0f64..10.0) {
            let mut b = CoupledBuilder::new();
            b.add_model(sink()).unwrap();
            let views = vec![View::new("v", timestep).unwrap().observe("sink", "in")];
            let opts = SimOptions { duration, ..SimOptions::default() };
            let tables = run_sim(b.build().unwrap(), views, &opts).unwrap();
            let time = &tables[0].time;
            prop_assert_eq!(time[0], 0.0);
            prop_assert!(time.windows(2).all(|w| w[0] < w[1]));
            let last = time[time.len() - 1];
            prop_assert!(last <= duration);
            prop_assert!(last + timestep > duration);
        }
    }
}
