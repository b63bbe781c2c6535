use inkpage::config::{ClassifierConfig, DocumentConfig};
use inkpage::draw::{BLUE, Point, PressureCurve, RED, Stroke, StrokeId, StrokeStyle, Tool};
use inkpage::input::{ContactClassifier, ContactId, ContactState, RawEvent, ToolHint, TouchPhase};
use inkpage::{AnnotationDocument, Command, HistoryOutcome};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct ContactPlan {
    hint: ToolHint,
    radius: Option<f64>,
    origin: (f64, f64),
    start_ms: u64,
    moves: usize,
}

fn contact_plan() -> impl Strategy<Value = ContactPlan> {
    (
        prop_oneof![
            Just(ToolHint::Stylus),
            Just(ToolHint::Finger),
            Just(ToolHint::Unknown)
        ],
        prop::option::of(0.5f64..40.0),
        (0.0f64..900.0, 0.0f64..900.0),
        0u64..120,
        1usize..8,
    )
        .prop_map(|(hint, radius, origin, start_ms, moves)| ContactPlan {
            hint,
            radius,
            origin,
            start_ms,
            moves,
        })
}

fn contact_events(id: ContactId, plan: &ContactPlan) -> Vec<RawEvent> {
    let total = plan.moves + 2;
    (0..total)
        .map(|step| {
            let phase = match step {
                0 => TouchPhase::Down,
                s if s == total - 1 => TouchPhase::Up,
                _ => TouchPhase::Move,
            };
            RawEvent {
                contact_id: id,
                x: plan.origin.0 + 6.0 * step as f64,
                y: plan.origin.1 + 3.0 * step as f64,
                pressure: plan.radius.map(|_| 0.5),
                radius: plan.radius,
                tool_hint: plan.hint,
                timestamp_ms: plan.start_ms + 8 * step as u64,
                phase,
            }
        })
        .collect()
}

/// All contacts' events merged in timestamp order, per-contact order kept.
fn interleave(plans: &[ContactPlan]) -> Vec<RawEvent> {
    let mut events: Vec<RawEvent> = plans
        .iter()
        .enumerate()
        .flat_map(|(i, plan)| contact_events(i as ContactId + 1, plan))
        .collect();
    events.sort_by_key(|e| e.timestamp_ms);
    events
}

/// A hand resting in one place for a third of a second.
fn resting_palm(id: ContactId, origin: (f64, f64), radius: f64, hint: ToolHint) -> Vec<RawEvent> {
    (0..=41u64)
        .map(|step| RawEvent {
            contact_id: id,
            x: origin.0,
            y: origin.1,
            pressure: Some(0.3),
            radius: Some(radius),
            tool_hint: hint,
            timestamp_ms: 8 * step,
            phase: match step {
                0 => TouchPhase::Down,
                41 => TouchPhase::Up,
                _ => TouchPhase::Move,
            },
        })
        .collect()
}

fn stroke(id: u64, page_index: u32, seed: f64) -> Stroke {
    Stroke {
        id: StrokeId(id),
        page_index,
        tool: Tool::Fountain,
        color: BLUE,
        base_width: 2.0,
        curve: PressureCurve::default(),
        points: vec![
            Point::new(seed, 0.2, 0.4, 0),
            Point::new((seed + 0.1).min(1.0), 0.3, 0.7, 8),
            Point::new((seed + 0.2).min(1.0), 0.5, 0.9, 16),
        ],
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add { page: u32, seed: f64 },
    Delete(usize),
    Restyle(usize, f64),
    Undo,
    Redo,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..4, 0.0f64..0.8).prop_map(|(page, seed)| Op::Add { page, seed }),
        1 => any::<usize>().prop_map(Op::Delete),
        1 => (any::<usize>(), 0.5f64..12.0).prop_map(|(i, w)| Op::Restyle(i, w)),
        1 => Just(Op::Undo),
        1 => Just(Op::Redo),
    ]
}

fn all_ids(doc: &AnnotationDocument) -> Vec<StrokeId> {
    doc.annotated_pages()
        .into_iter()
        .flat_map(|page| doc.strokes_for_page(page))
        .map(|s| s.id)
        .collect()
}

fn run_ops(ops: &[Op]) -> AnnotationDocument {
    let mut doc = AnnotationDocument::default();
    for op in ops {
        match op {
            Op::Add { page, seed } => {
                let id = doc.next_stroke_id();
                doc.apply(Command::AddStroke(stroke(id.0, *page, *seed)))
                    .unwrap();
            }
            Op::Delete(pick) => {
                let ids = all_ids(&doc);
                if !ids.is_empty() {
                    let stroke_id = ids[pick % ids.len()];
                    doc.apply(Command::DeleteStroke { stroke_id }).unwrap();
                }
            }
            Op::Restyle(pick, width) => {
                let ids = all_ids(&doc);
                if !ids.is_empty() {
                    let stroke_id = ids[pick % ids.len()];
                    let style = StrokeStyle {
                        color: RED,
                        base_width: *width,
                    };
                    doc.apply(Command::ChangeStrokeStyle { stroke_id, style })
                        .unwrap();
                }
            }
            Op::Undo => {
                doc.undo();
            }
            Op::Redo => {
                doc.redo();
            }
        }
    }
    doc
}

proptest! {
    #[test]
    fn large_contacts_are_rejected_and_tagged_pens_accepted(
        pen in contact_plan(),
        palms in prop::collection::vec(
            (18.0f64..60.0, prop_oneof![Just(ToolHint::Finger), Just(ToolHint::Unknown)], contact_plan()),
            1..5,
        ),
    ) {
        let mut plans = vec![ContactPlan { hint: ToolHint::Stylus, radius: Some(1.5), ..pen }];
        plans.extend(palms.into_iter().map(|(radius, hint, plan)| ContactPlan {
            hint,
            radius: Some(radius),
            ..plan
        }));

        let mut classifier = ContactClassifier::new(ClassifierConfig::default());
        let mut out = Vec::new();
        for event in interleave(&plans) {
            let state = classifier.process(&event, &mut out).unwrap();
            if event.contact_id == 1 {
                prop_assert_eq!(state, ContactState::Stylus);
            } else {
                prop_assert_eq!(state, ContactState::Palm);
            }
        }
        prop_assert!(out.iter().all(|e| e.contact_id == 1));
    }

    #[test]
    fn silent_touches_beside_a_palm_are_rejected(
        origin in (300.0f64..600.0, 300.0f64..600.0),
        radius in 18.0f64..60.0,
        touches in prop::collection::vec(
            (
                (-150.0f64..150.0, -150.0f64..150.0),
                prop_oneof![Just(ToolHint::Finger), Just(ToolHint::Unknown)],
                1u64..200,
                1usize..8,
            ),
            1..5,
        ),
    ) {
        let mut plans = Vec::new();
        for ((dx, dy), hint, start_ms, moves) in touches {
            plans.push(ContactPlan {
                hint,
                radius: None,
                origin: (origin.0 + dx, origin.1 + dy),
                start_ms,
                moves,
            });
        }
        let mut events = resting_palm(100, origin, radius, ToolHint::Finger);
        for (i, plan) in plans.iter().enumerate() {
            events.extend(contact_events(i as ContactId + 1, plan));
        }
        events.sort_by_key(|e| e.timestamp_ms);

        let mut classifier = ContactClassifier::new(ClassifierConfig::default());
        let mut out = Vec::new();
        for event in &events {
            let state = classifier.process(event, &mut out).unwrap();
            prop_assert_eq!(state, ContactState::Palm);
        }
        prop_assert!(out.is_empty());
        prop_assert!(!classifier.is_degraded());
    }

    #[test]
    fn degraded_device_follows_tool_hints(plans in prop::collection::vec(contact_plan(), 1..6)) {
        let plans: Vec<ContactPlan> = plans
            .into_iter()
            .map(|plan| ContactPlan { radius: None, ..plan })
            .collect();

        let mut classifier = ContactClassifier::new(ClassifierConfig::default());
        let mut out = Vec::new();
        for event in interleave(&plans) {
            let state = classifier.process(&event, &mut out).unwrap();
            match event.tool_hint {
                ToolHint::Stylus => {
                    prop_assert_eq!(state, ContactState::Stylus);
                }
                ToolHint::Finger => {
                    prop_assert_eq!(state, ContactState::Palm);
                }
                ToolHint::Unknown => {
                    prop_assert!(state.is_settled());
                }
            }
        }
        prop_assert!(classifier.is_degraded());
        prop_assert!(out.iter().all(|e| e.tool_hint != ToolHint::Finger));
    }

    #[test]
    fn settled_classification_never_changes(
        plans in prop::collection::vec(contact_plan(), 1..6),
        tick_gap in 0u64..80,
    ) {
        let mut classifier = ContactClassifier::new(ClassifierConfig::default());
        let mut out = Vec::new();
        let mut settled: HashMap<ContactId, ContactState> = HashMap::new();

        let check = |classifier: &ContactClassifier,
                     settled: &mut HashMap<ContactId, ContactState>|
         -> Result<(), TestCaseError> {
            for id in 1..=plans.len() as ContactId {
                let Some(state) = classifier.state_of(id) else { continue };
                match settled.get(&id) {
                    Some(first) => {
                        prop_assert_eq!(*first, state);
                    }
                    None if state.is_settled() => {
                        settled.insert(id, state);
                    }
                    None => {}
                }
            }
            Ok(())
        };

        for event in interleave(&plans) {
            let now = event.timestamp_ms;
            let _ = classifier.process(&event, &mut out);
            check(&classifier, &mut settled)?;
            classifier.tick(now + tick_gap, &mut out);
            check(&classifier, &mut settled)?;
        }
    }

    #[test]
    fn serialized_documents_round_trip(ops in prop::collection::vec(op(), 0..24)) {
        let doc = run_ops(&ops);
        let bytes = doc.serialize().unwrap();
        let restored = AnnotationDocument::deserialize(&bytes, &DocumentConfig::default()).unwrap();
        prop_assert_eq!(restored.snapshot(), doc.snapshot());
        prop_assert_eq!(restored.serialize().unwrap(), bytes);
        prop_assert!(restored.check_consistency().is_ok());
    }

    #[test]
    fn undo_then_redo_restores_state(ops in prop::collection::vec(op(), 1..24)) {
        let mut doc = run_ops(&ops);
        prop_assert!(doc.check_consistency().is_ok());

        let before = doc.snapshot();
        if doc.undo() == HistoryOutcome::Applied {
            prop_assert_eq!(doc.redo(), HistoryOutcome::Applied);
            prop_assert_eq!(doc.snapshot(), before);
        }

        while doc.can_redo() {
            doc.redo();
        }
        let top = doc.snapshot();
        let revision = doc.revision();
        prop_assert_eq!(doc.redo(), HistoryOutcome::AtBoundary);
        prop_assert_eq!(doc.snapshot(), top);
        prop_assert_eq!(doc.revision(), revision);
    }

    #[test]
    fn width_grows_with_pressure(
        curve in prop_oneof![
            (0.0f64..3.0, 0.0f64..3.0).prop_map(|(a, b)| PressureCurve::linear(a, b)),
            (0.0f64..5.0, 0.0f64..3.0, 0.0f64..3.0)
                .prop_map(|(e, a, b)| PressureCurve::gamma(e, a, b)),
            prop::collection::vec((0.0f64..1.0, 0.0f64..3.0), 0..6).prop_map(PressureCurve::table),
            Just(PressureCurve::Constant),
        ],
        mut pressures in prop::collection::vec(0.0f64..=1.0, 2..16),
    ) {
        pressures.sort_by(f64::total_cmp);
        let widths: Vec<f64> = pressures.iter().map(|p| curve.multiplier(*p)).collect();
        for pair in widths.windows(2) {
            prop_assert!(pair[0] <= pair[1] + 1e-12, "{:?} decreased: {:?}", curve, widths);
        }
        prop_assert!(curve.is_monotonic());
    }
}
