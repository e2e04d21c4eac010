use insta::assert_snapshot;

use super::*;
use crate::backend::{ConfigureChanges, Deadline, NodeOwner};
use crate::layout_demand::LayoutError;
use crate::root::{Event, TransactionState};
use crate::utils::{Point, Rectangle, Size, Tags};
use crate::view::SizeConstraints;

fn format_current_geometries(f: &Fixture) -> String {
    let lines: Vec<_> = f
        .root
        .views()
        .iter()
        .map(|view| format!("{}: {}", view.id(), view.current.geometry))
        .collect();
    lines.join("\n")
}

#[test]
fn map_and_commit() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    let view = f.map_new_view((10, 10, 100, 100));

    f.apply_pending();
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );
    assert!(f.backend.is_armed(Deadline::Configures));
    assert!(f.backend.has_saved_surface(view));

    // Not committed yet.
    assert_eq!(f.root.view(view).unwrap().current.output, None);
    assert!(!f.backend.is_view_visible(view));

    f.ack(view);
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_eq!(f.root.committed_transactions(), 1);
    assert!(!f.backend.is_armed(Deadline::Configures));
    assert!(!f.backend.has_saved_surface(view));

    let current = f.root.view(view).unwrap().current;
    assert_eq!(current.output, Some(output));
    assert!(f.backend.is_view_visible(view));

    assert_snapshot!(f.dump(), @r"
    hidden [disabled]
    output-1
      popups
        popups view-1 at (10, 10)
      fullscreen [disabled]
      floating
      tiled
        window view-1 at (10, 10)
    ");
}

#[test]
fn unchanged_state_commits_without_configures() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    f.map_new_view((0, 0, 100, 100));
    f.apply_and_commit();
    assert_eq!(f.backend.configure_count(), 1);

    f.apply_pending();
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_eq!(f.root.committed_transactions(), 2);
    assert_eq!(f.backend.configure_count(), 1);
}

#[test]
fn configure_carries_changes() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let view = f.map_new_view((0, 0, 100, 100));
    f.apply_and_commit();

    f.root.set_view_geometry(view, Rectangle::new(Point::new(0, 0), Size::new(200, 100)));
    f.root.set_view_resizing(view, true);
    f.apply_pending();

    let sent = f.backend.configures()[&view];
    assert_eq!(sent.changes, ConfigureChanges::SIZE | ConfigureChanges::RESIZING);
    assert_eq!(sent.state.geometry.size, Size::new(200, 100));
}

#[test]
fn commit_waits_for_every_view() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let a = f.map_new_view((0, 0, 100, 100));
    let b = f.map_new_view((0, 0, 200, 200));
    f.apply_and_commit();

    f.root.set_view_geometry(a, Rectangle::new(Point::new(0, 0), Size::new(300, 300)));
    f.root.set_view_geometry(b, Rectangle::new(Point::new(0, 0), Size::new(400, 400)));
    f.apply_pending();
    assert_eq!(f.root.inflight_configures(), 2);

    f.ack(a);

    // Still waiting for the second view.
    assert_snapshot!(format_current_geometries(&f), @r"
    view-1: 100x100 at (0, 0)
    view-2: 200x200 at (0, 0)
    ");

    f.ack(b);

    assert_snapshot!(format_current_geometries(&f), @r"
    view-1: 300x300 at (0, 0)
    view-2: 400x400 at (0, 0)
    ");
}

#[test]
fn timeout_commits_once() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let a = f.map_new_view((0, 0, 100, 100));
    let b = f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    f.ack(a);

    f.advance(199);
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );
    assert_eq!(f.root.committed_transactions(), 0);

    f.advance(1);
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_eq!(f.root.committed_transactions(), 1);
    assert!(!f.root.view(b).unwrap().awaiting_configure);

    // The late acknowledgment changes nothing.
    f.ack(b);
    assert_eq!(f.root.committed_transactions(), 1);

    // Neither does a stray deadline.
    f.step(Event::DeadlineReached(Deadline::Configures));
    assert_eq!(f.root.committed_transactions(), 1);
}

#[test]
fn apply_during_transaction_replays_once() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let view = f.map_new_view((0, 0, 100, 100));

    f.apply_pending();

    f.root.set_view_geometry(view, Rectangle::new(Point::new(0, 0), Size::new(200, 200)));
    f.apply_pending();
    f.apply_pending();
    assert!(f.root.pending_state_dirty());
    assert_eq!(f.root.committed_transactions(), 0);

    // The commit starts exactly one new transaction.
    f.ack(view);
    assert_eq!(f.root.committed_transactions(), 1);
    assert!(!f.root.pending_state_dirty());
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );
    assert_eq!(f.backend.configure_count(), 2);

    f.ack(view);
    assert_eq!(f.root.committed_transactions(), 2);
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_eq!(
        f.root.view(view).unwrap().current.geometry.size,
        Size::new(200, 200)
    );
}

#[test]
fn focus_is_resynced_even_when_delayed() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    f.apply_pending();
    assert_eq!(f.backend.focus_resyncs(), 2);
}

#[test]
fn layout_demand() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    let a = f.map_new_view((0, 0, 100, 100));
    let b = f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    assert_eq!(f.root.transaction_state(), TransactionState::AwaitingLayout);
    assert!(f.backend.is_armed(Deadline::LayoutDemand(output)));
    assert!(f.backend.configures().is_empty());

    let request = f.backend.layout_demand(output).unwrap();
    assert_eq!(request.namespace, "tile");
    assert_eq!(request.view_count, 2);
    assert_eq!(request.usable_size, Size::new(1920, 1080));

    // Views are laid out in wm stack order, newest on top.
    let demand = f.root.output(output).unwrap().layout_demand().unwrap();
    assert_eq!(demand.views, [b, a]);

    f.answer_layout(output, &[(0, 0, 960, 1080), (960, 0, 960, 1080)]);
    assert!(!f.backend.is_armed(Deadline::LayoutDemand(output)));
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );

    f.ack_all();
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_snapshot!(format_current_geometries(&f), @r"
    view-1: 956x1076 at (962, 2)
    view-2: 956x1076 at (2, 2)
    ");
}

#[test]
fn layout_skips_floating_and_hidden_views() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    let a = f.map_new_view((0, 0, 100, 100));
    let b = f.map_new_view((0, 0, 100, 100));
    let c = f.map_new_view((0, 0, 100, 100));
    f.root.set_view_float(b, true);
    f.root.set_view_tags(c, Tags(0b10));

    f.apply_pending();
    let demand = f.root.output(output).unwrap().layout_demand().unwrap();
    assert_eq!(demand.views, [a]);
}

#[test]
fn layout_respects_usable_area_and_constraints() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    f.root
        .set_usable_area(output, Rectangle::new(Point::new(0, 30), Size::new(1920, 1050)));
    let view = f.map_new_view((0, 0, 100, 100));
    f.root.set_view_constraints(
        view,
        SizeConstraints {
            min: Size::new(1, 1),
            max: Size::new(800, 600),
        },
    );

    f.apply_pending();
    assert_eq!(
        f.backend.layout_demand(output).unwrap().usable_size,
        Size::new(1920, 1050)
    );
    f.answer_layout(output, &[(0, 0, 1920, 1050)]);
    f.ack_all();

    let view = f.root.view(view).unwrap();
    assert_eq!(view.current.geometry.to_string(), "800x600 at (2, 32)");
    // Tiled views keep the proposed geometry for the next transaction.
    assert_eq!(view.pending.geometry, view.current.geometry);
}

#[test]
fn layout_count_mismatch() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    f.map_new_view((0, 0, 100, 100));
    f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    f.answer_layout(output, &[(0, 0, 1920, 1080)]);

    assert_eq!(
        f.backend.layout_errors(),
        [(
            output,
            LayoutError::CountMismatch {
                proposed: 1,
                expected: 2
            }
        )]
    );

    // The transaction goes on with the geometry the views already had.
    f.ack_all();
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert_snapshot!(format_current_geometries(&f), @r"
    view-1: 100x100 at (0, 0)
    view-2: 100x100 at (0, 0)
    ");
}

#[test]
fn layout_demand_timeout() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    let serial = f.backend.layout_demand(output).unwrap().serial;

    f.advance(100);
    assert!(f.backend.layout_demand(output).is_none());
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );

    // The late answer is ignored.
    f.step(Event::LayoutDimensions {
        output,
        serial,
        proposal: Rectangle::new(Point::new(0, 0), Size::new(1920, 1080)),
    });
    f.step(Event::LayoutDemandCommit { output, serial });
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );

    f.ack_all();
    assert_snapshot!(format_current_geometries(&f), @"view-1: 100x100 at (0, 0)");
}

#[test]
fn stale_layout_serial_is_ignored() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    let serial = f.backend.layout_demand(output).unwrap().serial;

    f.step(Event::LayoutDemandCommit {
        output,
        serial: serial + 1,
    });
    assert_eq!(f.root.transaction_state(), TransactionState::AwaitingLayout);

    f.answer_layout(output, &[(0, 0, 1920, 1080)]);
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );
}

#[test]
fn failed_layout_demand_is_skipped() {
    let mut f = Fixture::new();
    let output = f.add_output(1, (1920, 1080));
    f.root.set_output_layout(output, Some(String::from("tile")));
    f.map_new_view((0, 0, 100, 100));
    f.backend.set_fail_layout_demands(true);

    f.apply_pending();
    assert_eq!(f.root.inflight_layout_demands(), 0);
    assert!(!f.backend.is_armed(Deadline::LayoutDemand(output)));
    assert_eq!(
        f.root.transaction_state(),
        TransactionState::AwaitingConfigures
    );
}

#[test]
fn destroy_is_deferred_until_commit() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let view = f.map_new_view((0, 0, 100, 100));
    f.apply_and_commit();

    f.root.destroy_view(&mut f.backend, view);
    f.root.verify_invariants();
    // Still shown until the next commit.
    assert!(f.root.view(view).is_some());
    assert!(f.backend.is_view_visible(view));

    f.apply_pending();
    assert!(f.root.view(view).is_none());
    assert_snapshot!(f.dump(), @r"
    hidden [disabled]
    output-1
      popups
      fullscreen [disabled]
      floating
      tiled
    ");
}

#[test]
fn destroy_while_awaiting_configure() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let view = f.map_new_view((0, 0, 100, 100));

    f.apply_pending();
    f.root.destroy_view(&mut f.backend, view);
    f.root.verify_invariants();
    assert!(f.root.view(view).is_some());

    // The inflight transaction still shows the view.
    f.ack(view);
    assert!(f.root.view(view).is_some());

    f.apply_pending();
    assert!(f.root.view(view).is_none());
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
}

#[test]
fn destroy_unmapped_view_is_immediate() {
    let mut f = Fixture::new();
    let view = f.new_view();
    let nodes = f.backend.node_count();

    f.root.destroy_view(&mut f.backend, view);
    f.root.verify_invariants();
    assert!(f.root.view(view).is_none());
    assert_eq!(f.backend.node_count(), nodes - 2);
}

#[test]
fn unmap_hides_after_commit() {
    let mut f = Fixture::new();
    f.add_output(1, (1920, 1080));
    let view = f.map_new_view((0, 0, 100, 100));
    f.apply_and_commit();

    f.root.unmap_view(view);
    f.root.verify_invariants();
    assert!(f.backend.is_view_visible(view));

    f.apply_pending();
    assert_eq!(f.root.transaction_state(), TransactionState::Idle);
    assert!(!f.backend.is_view_visible(view));
    assert_eq!(
        f.backend.view_parent(view),
        Some(NodeOwner::Hidden)
    );
}
