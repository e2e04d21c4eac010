use std::time::Duration;

use crate::backend::Headless;
use crate::output::OutputId;
use crate::root::{Event, Options, Root, TransactionState};
use crate::utils::{Point, Rectangle, Size};
use crate::view::ViewId;

pub struct Fixture {
    pub root: Root,
    pub backend: Headless,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let mut backend = Headless::new();
        let root = Root::new(options, &mut backend);
        Self { root, backend }
    }

    pub fn step(&mut self, event: Event) {
        self.root.step(&mut self.backend, event);
        self.root.verify_invariants();
    }

    pub fn add_output(&mut self, n: u8, size: (i32, i32)) -> OutputId {
        let name = format!("HEADLESS-{n}");
        self.step(Event::NewOutput {
            name: name.clone(),
            size: Size::from(size),
        });
        self.root.output_by_name(&name).unwrap()
    }

    pub fn remove_output(&mut self, output: OutputId) {
        self.step(Event::OutputRemoved(output));
    }

    pub fn new_view(&mut self) -> ViewId {
        let id = self.root.new_view(&mut self.backend);
        self.root.verify_invariants();
        id
    }

    /// Creates and maps a view with the given initial geometry.
    pub fn map_new_view(&mut self, geometry: (i32, i32, i32, i32)) -> ViewId {
        self.map_new_view_with(None, geometry)
    }

    pub fn map_new_view_on(&mut self, output: OutputId, geometry: (i32, i32, i32, i32)) -> ViewId {
        self.map_new_view_with(Some(output), geometry)
    }

    fn map_new_view_with(
        &mut self,
        output: Option<OutputId>,
        geometry: (i32, i32, i32, i32),
    ) -> ViewId {
        let id = self.new_view();
        let (x, y, w, h) = geometry;
        self.root
            .set_view_geometry(id, Rectangle::new(Point::new(x, y), Size::new(w, h)));
        self.root.map_view(id, output);
        self.root.verify_invariants();
        id
    }

    pub fn apply_pending(&mut self) {
        self.root.apply_pending(&mut self.backend);
        self.root.verify_invariants();
    }

    pub fn ack(&mut self, view: ViewId) {
        assert!(
            self.backend.take_configure(view).is_some(),
            "{view} has no outstanding configure"
        );
        self.step(Event::ConfigureAcked(view));
    }

    /// Acknowledges every outstanding configure, returning how many there were.
    pub fn ack_all(&mut self) -> usize {
        let views = self.backend.take_configures();
        for view in &views {
            self.step(Event::ConfigureAcked(*view));
        }
        views.len()
    }

    /// Answers the outstanding layout demand of an output with the given rectangles.
    pub fn answer_layout(&mut self, output: OutputId, proposals: &[(i32, i32, i32, i32)]) {
        let demand = self.backend.take_layout_demand(output).unwrap();
        for &(x, y, w, h) in proposals {
            self.step(Event::LayoutDimensions {
                output,
                serial: demand.serial,
                proposal: Rectangle::new(Point::new(x, y), Size::new(w, h)),
            });
        }
        self.step(Event::LayoutDemandCommit {
            output,
            serial: demand.serial,
        });
    }

    /// Moves the clock forward and delivers the deadlines that expired.
    pub fn advance(&mut self, ms: u64) {
        for deadline in self.backend.advance(Duration::from_millis(ms)) {
            self.step(Event::DeadlineReached(deadline));
        }
    }

    /// Applies pending state and acknowledges configures until the transaction committed.
    pub fn apply_and_commit(&mut self) {
        self.apply_pending();
        while self.root.transaction_state() == TransactionState::AwaitingConfigures {
            self.ack_all();
        }
        assert_eq!(self.root.transaction_state(), TransactionState::Idle);
    }

    pub fn dump(&self) -> String {
        self.backend.dump()
    }
}
