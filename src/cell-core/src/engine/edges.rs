// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Edge detection between two consecutive samples.

use crate::plant::signal::{Edge, Input};
use crate::plant::snapshot::SignalFrame;
use crate::sync::EventSignal;

/// Compare two samples and return the edges to fire.
///
/// At most one edge per input: a changed input fires the edge selected by
/// its *new* value, or nothing if the new value has no edge attached
/// (barrier clearing, conveyor restarting, robot leaving a station).
pub fn detect_edges(previous: &SignalFrame, current: &SignalFrame) -> Vec<Edge> {
    let mut edges = Vec::new();
    let changed = |input: Input| previous.get(input) != current.get(input);

    if changed(Input::OpticalBarrier) && current.optical_barrier() {
        edges.push(Edge::ObjectDetected);
    }

    if changed(Input::GripperClosed) {
        edges.push(if current.gripper_closed() {
            Edge::GripperClosed
        } else {
            Edge::GripperOpened
        });
    }

    if changed(Input::RobotPosition) {
        if let Some(position) = current.position() {
            edges.push(Edge::reached(position));
        }
    }

    if changed(Input::EvacConveyorStopped) && current.evac_conveyor_stopped() {
        edges.push(Edge::EvacConveyorStopped);
    }

    edges
}

/// One [`EventSignal`] per [`Edge`], alive as long as the engine.
#[derive(Debug, Default)]
pub struct EventBank {
    signals: [EventSignal; Edge::COUNT],
}

impl EventBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self, edge: Edge) -> &EventSignal {
        &self.signals[edge.index()]
    }

    pub fn notify(&self, edge: Edge) {
        self.signal(edge).notify();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plant::signal::Position;
    use std::time::Duration;

    fn frame() -> SignalFrame {
        SignalFrame::new()
            .with(Input::RobotPosition, Position::Supply.raw())
            .with(Input::EvacConveyorStopped, 1)
    }

    #[test]
    fn test_no_change_no_edges() {
        assert!(detect_edges(&frame(), &frame()).is_empty());
    }

    #[test]
    fn test_barrier_fires_only_when_obstructed() {
        let clear = frame();
        let blocked = clear.with(Input::OpticalBarrier, 1);
        assert_eq!(detect_edges(&clear, &blocked), vec![Edge::ObjectDetected]);
        assert!(detect_edges(&blocked, &clear).is_empty());
    }

    #[test]
    fn test_gripper_selects_edge_by_new_value() {
        let open = frame();
        let closed = open.with(Input::GripperClosed, 1);
        assert_eq!(detect_edges(&open, &closed), vec![Edge::GripperClosed]);
        assert_eq!(detect_edges(&closed, &open), vec![Edge::GripperOpened]);
    }

    #[test]
    fn test_position_transitions() {
        let supply = frame();
        let transit = supply.with(Input::RobotPosition, 0);
        let assembly = supply.with(Input::RobotPosition, Position::Assembly.raw());

        assert!(detect_edges(&supply, &transit).is_empty());
        assert_eq!(
            detect_edges(&transit, &assembly),
            vec![Edge::ReachedAssembly]
        );
        // Direct jump between stations without a transit sample.
        assert_eq!(
            detect_edges(&assembly, &supply),
            vec![Edge::ReachedSupply]
        );
    }

    #[test]
    fn test_evac_conveyor_edge() {
        let stopped = frame();
        let running = stopped.with(Input::EvacConveyorStopped, 0);
        assert!(detect_edges(&stopped, &running).is_empty());
        assert_eq!(
            detect_edges(&running, &stopped),
            vec![Edge::EvacConveyorStopped]
        );
    }

    #[test]
    fn test_level_inputs_never_fire() {
        let before = frame();
        let after = before
            .with(Input::ObjectType, 2)
            .with(Input::OperationDone, 1)
            .with(Input::RecognitionDone, 1)
            .with(Input::AssemblyOk, 1)
            .with(Input::AssemblyEvacuated, 1);
        assert!(detect_edges(&before, &after).is_empty());
    }

    #[test]
    fn test_simultaneous_changes_one_edge_each() {
        let before = frame();
        let after = before
            .with(Input::OpticalBarrier, 1)
            .with(Input::GripperClosed, 1)
            .with(Input::RobotPosition, Position::Evacuation.raw())
            .with(Input::EvacConveyorStopped, 0);
        assert_eq!(
            detect_edges(&before, &after),
            vec![
                Edge::ObjectDetected,
                Edge::GripperClosed,
                Edge::ReachedEvacuation
            ]
        );
    }

    #[test]
    fn test_bank_routes_to_matching_signal() {
        let bank = EventBank::new();
        let armed = bank.signal(Edge::GripperOpened).arm();
        bank.notify(Edge::GripperClosed);
        assert!(!armed.fired());
        bank.notify(Edge::GripperOpened);
        assert!(armed.wait_for(Duration::from_millis(1)));
    }
}
