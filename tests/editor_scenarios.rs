use easyyolo_domain::{BbF, PtF, ShapeI};
use yololib::{
    cfg::EditorCfg,
    editor::{AnnotationEditor, Interaction, Mode, MousePhase, Suggestion, TouchPhase},
    image_source::LoadTicket,
    persistence::{self, KeyValueStore, MemoryStore},
    test_helpers::{
        load_test_image, make_test_editor, test_descriptor, test_image, DrawOp, FailingStore,
        ImmediateSource, ManualSource, RecordingSurface, ScriptedLabels, TestEditor,
    },
    tracing_setup::init_tracing_for_tests,
    DecodedImage, EditorInput, KeyCode, MouseInput, NotificationLevel, PointerEvent, TouchInput,
};

fn down(editor: &mut TestEditor<impl KeyValueStore>, x: f64, y: f64) {
    editor.handle_input(EditorInput::PointerDown(PointerEvent::new(x, y)));
}
fn mv(editor: &mut TestEditor<impl KeyValueStore>, x: f64, y: f64) {
    editor.handle_input(EditorInput::PointerMove(PointerEvent::new(x, y)));
}
fn up(editor: &mut TestEditor<impl KeyValueStore>, x: f64, y: f64) {
    editor.handle_input(EditorInput::PointerUp(PointerEvent::new(x, y)));
}
fn draw(editor: &mut TestEditor<impl KeyValueStore>, from: (f64, f64), to: (f64, f64)) {
    down(editor, from.0, from.1);
    mv(editor, to.0, to.1);
    up(editor, to.0, to.1);
}
fn click(editor: &mut TestEditor<impl KeyValueStore>, x: f64, y: f64) {
    down(editor, x, y);
    up(editor, x, y);
}

fn labels(answers: &[&str]) -> ScriptedLabels {
    ScriptedLabels::new(answers.iter().map(|a| Some(*a)))
}

fn stored(editor: &TestEditor) -> yololib::AnnotationSet {
    persistence::load_annotations(editor.store(), &editor.cfg().storage_key)
}

#[test]
fn test_scenario_a_draw_on_scaled_image() {
    init_tracing_for_tests();
    let mut editor = make_test_editor(labels(&["car"]));
    load_test_image(&mut editor, "street.png", 1600, 1200);
    let vp = *editor.viewport().unwrap();
    assert_eq!(vp.scale, 0.5);
    assert_eq!(vp.shape_view, ShapeI::new(800, 600));

    draw(&mut editor, (100.0, 100.0), (300.0, 250.0));
    let annos = editor.current_annotations();
    assert_eq!(annos.len(), 1);
    assert_eq!(annos[0].bb(), BbF::from_arr(&[200.0, 200.0, 400.0, 300.0]));
    assert_eq!(annos[0].label, "car");
    assert_eq!(editor.labels().prompts, vec!["object"]);
    assert_eq!(annos[0].confidence, 1.0);
    assert!(editor.state().is_idle());
    assert_eq!(&stored(&editor), editor.annotations());
    // the box is painted in display space
    let strokes = editor.surface().strokes();
    assert_eq!(
        strokes,
        vec![(BbF::from_arr(&[100.0, 100.0, 200.0, 150.0]), editor.cfg().colors.saved)]
    );
    assert_eq!(editor.surface().texts(), vec!["car"]);
}

#[test]
fn test_scenario_b_export_import() {
    let mut editor = make_test_editor(ScriptedLabels::default());
    load_test_image(&mut editor, "a.png", 640, 480);
    editor
        .add_annotation(BbF::from_arr(&[10.0, 10.0, 50.0, 60.0]), "cat", 1.0)
        .unwrap();
    editor
        .add_annotation(BbF::from_arr(&[100.0, 20.0, 30.0, 30.0]), "dog", 0.85)
        .unwrap();
    load_test_image(&mut editor, "b.png", 320, 240);
    editor
        .add_annotation(BbF::from_arr(&[0.0, 0.0, 20.0, 20.0]), "cat", 1.0)
        .unwrap();
    let exported = editor.export_annotations().unwrap();

    let mut other = make_test_editor(ScriptedLabels::default());
    assert!(other.import_annotations(&exported));
    assert_eq!(other.annotations(), editor.annotations());
    let stats = other.get_statistics();
    assert_eq!(stats, editor.get_statistics());
    assert_eq!(stats.total_images, 2);
    assert_eq!(stats.total_annotations, 3);
    assert_eq!(stats.annotations_by_class["cat"], 2);
    assert_eq!(&stored(&other), other.annotations());
    let notes = other.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Info);
}

#[test]
fn test_scenario_c_escape_while_drawing() {
    for to in [(1.0, 1.0), (5.0, 50.0), (300.0, 200.0)] {
        let mut editor = make_test_editor(labels(&["x"]));
        load_test_image(&mut editor, "a.png", 400, 300);
        draw(&mut editor, (10.0, 10.0), (60.0, 60.0));
        let before = editor.annotations().clone();
        down(&mut editor, 0.0, 0.0);
        mv(&mut editor, to.0, to.1);
        assert!(editor.state().is_drawing());
        editor.press_key(KeyCode::Escape);
        assert!(editor.state().is_idle());
        assert_eq!(editor.annotations(), &before);
        up(&mut editor, to.0, to.1);
        assert_eq!(editor.annotations(), &before);
        // no live box is painted any more
        assert_eq!(editor.surface().strokes().len(), 1);
    }
}

#[test]
fn test_min_size_never_appends() {
    let mut editor = make_test_editor(labels(&["a", "b", "c", "d", "e"]));
    load_test_image(&mut editor, "a.png", 1600, 1200);
    let pairs = [
        ((100.0, 100.0), (109.9, 300.0)),
        ((100.0, 100.0), (300.0, 109.0)),
        ((100.0, 100.0), (91.0, 50.0)),
        ((100.0, 100.0), (100.0, 100.0)),
        ((500.0, 500.0), (300.0, 495.0)),
    ];
    for (from, to) in pairs {
        draw(&mut editor, from, to);
    }
    assert!(editor.annotations().is_empty());
    assert!(editor.current_annotations().is_empty());
    assert!(editor.labels().prompts.is_empty());
}

#[test]
fn test_cancelled_labels() {
    let mut editor = make_test_editor(ScriptedLabels::new([None, Some(""), Some("   ")]));
    load_test_image(&mut editor, "a.png", 400, 300);
    for _ in 0..4 {
        draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    }
    assert!(editor.current_annotations().is_empty());
    assert!(editor.state().is_idle());
    assert_eq!(editor.labels().prompts.len(), 4);
}

#[test]
fn test_topmost_wins_and_resize() {
    let mut editor = make_test_editor(labels(&["first", "second"]));
    load_test_image(&mut editor, "a.png", 800, 800);
    let scale = editor.viewport().unwrap().scale;
    assert_eq!(scale, 1.0);
    draw(&mut editor, (10.0, 10.0), (110.0, 110.0));
    draw(&mut editor, (60.0, 60.0), (160.0, 160.0));
    editor.press_key(KeyCode::S);
    assert_eq!(editor.state().mode, Mode::Select);
    click(&mut editor, 80.0, 80.0);
    assert_eq!(editor.state().selected, Some(1));
    click(&mut editor, 20.0, 20.0);
    assert_eq!(editor.state().selected, Some(0));
    click(&mut editor, 500.0, 500.0);
    assert_eq!(editor.state().selected, None);

    // resize the second box on its nw corner past the se corner
    click(&mut editor, 80.0, 80.0);
    down(&mut editor, 61.0, 61.0);
    assert!(matches!(
        editor.state().interaction,
        Interaction::Resizing { idx: 1, .. }
    ));
    for (x, y) in [(30.0, 40.0), (400.0, 400.0), (159.0, 0.0), (-20.0, 900.0)] {
        mv(&mut editor, x, y);
        let anno = &editor.current_annotations()[1];
        assert!(anno.width > 0.0 && anno.height > 0.0, "{anno:?}");
        assert_eq!(anno.label, "second");
    }
    up(&mut editor, -20.0, 900.0);
    assert!(editor.state().is_idle());
    let anno = &editor.current_annotations()[1];
    assert_eq!(anno.bb(), BbF::from_arr(&[0.0, 159.0, 160.0, 1.0]));
    assert_eq!(&stored(&editor), editor.annotations());
    // selected box is drawn in the active color with four handles
    let active = editor.cfg().colors.active;
    let n_handles = editor
        .surface()
        .ops
        .iter()
        .filter(|op| matches!(op, DrawOp::FillRect(bb, c) if *c == active && bb.w == 6.0))
        .count();
    assert_eq!(n_handles, 4);
}

#[test]
fn test_drag_moves_box() {
    let mut editor = make_test_editor(labels(&["box"]));
    load_test_image(&mut editor, "a.png", 1600, 1200);
    draw(&mut editor, (100.0, 100.0), (200.0, 200.0));
    let id = editor.current_annotations()[0].id;
    editor.press_key(KeyCode::S);
    down(&mut editor, 150.0, 150.0);
    mv(&mut editor, 170.0, 140.0);
    up(&mut editor, 170.0, 140.0);
    let anno = &editor.current_annotations()[0];
    assert_eq!(anno.id, id);
    assert_eq!(anno.bb(), BbF::from_arr(&[240.0, 180.0, 200.0, 200.0]));
    assert_eq!(&stored(&editor), editor.annotations());
}

#[test]
fn test_delete_correctness() {
    let mut editor = make_test_editor(labels(&["a", "b", "c", "d", "e"]));
    load_test_image(&mut editor, "a.png", 800, 600);
    for i in 0..5 {
        let x = 10.0 + 120.0 * f64::from(i);
        draw(&mut editor, (x, 10.0), (x + 100.0, 100.0));
    }
    let before = editor.current_annotations().to_vec();
    editor.press_key(KeyCode::S);
    click(&mut editor, 300.0, 50.0);
    assert_eq!(editor.state().selected, Some(2));
    editor.press_key(KeyCode::Delete);
    let after = editor.current_annotations().to_vec();
    assert_eq!(after.len(), 4);
    let mut expected = before.clone();
    expected.remove(2);
    assert_eq!(after, expected);
    assert_eq!(editor.state().selected, None);
    assert_eq!(&stored(&editor), editor.annotations());

    // nothing selected, nothing deleted
    editor.press_key(KeyCode::Back);
    assert_eq!(editor.current_annotations().len(), 4);

    assert_eq!(editor.batch_delete(&[3, 0, 0, 17]), 2);
    let ids = editor
        .current_annotations()
        .iter()
        .map(|a| a.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![before[1].id, before[3].id]);

    editor.clear_all();
    assert!(editor.annotations().is_empty());
    assert!(stored(&editor).is_empty());
}

#[test]
fn test_persistence_idempotence() {
    let mut editor = make_test_editor(labels(&["a", "b", "c"]));
    let store = editor.store().clone();
    let reloaded = AnnotationEditor::new(
        EditorCfg::default(),
        store,
        ScriptedLabels::default(),
        RecordingSurface::default(),
    );
    assert_eq!(reloaded.annotations(), editor.annotations());

    load_test_image(&mut editor, "a.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    load_test_image(&mut editor, "b.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    draw(&mut editor, (50.0, 50.0), (200.0, 120.0));
    let store = editor.store().clone();
    let reloaded = AnnotationEditor::new(
        EditorCfg::default(),
        store,
        ScriptedLabels::default(),
        RecordingSurface::default(),
    );
    assert_eq!(reloaded.annotations(), editor.annotations());
    assert_eq!(reloaded.get_statistics().total_annotations, 3);
}

#[test]
fn test_malformed_store_starts_empty() {
    init_tracing_for_tests();
    let mut store = MemoryStore::new();
    store.set("easyYoloAnnotations", "{\"a.png\": [").unwrap();
    let editor = AnnotationEditor::new(
        EditorCfg::default(),
        store,
        ScriptedLabels::default(),
        RecordingSurface::default(),
    );
    assert!(editor.annotations().is_empty());
}

#[test]
fn test_failing_store_is_not_fatal() {
    init_tracing_for_tests();
    let mut editor = AnnotationEditor::new(
        EditorCfg::default(),
        FailingStore::default(),
        labels(&["a"]),
        RecordingSurface::default(),
    );
    load_test_image(&mut editor, "a.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    assert_eq!(editor.current_annotations().len(), 1);
    assert!(editor.store().n_attempts > 0);
}

#[test]
fn test_no_interaction_before_image_ready() {
    let mut editor = make_test_editor(labels(&["a", "b"]));
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    assert!(editor.annotations().is_empty());
    assert_eq!(editor.surface().n_frames, 0);
    assert!(editor
        .add_annotation(BbF::from_arr(&[0.0, 0.0, 20.0, 20.0]), "a", 1.0)
        .is_err());

    let mut source = ManualSource::default();
    let t1 = editor.load_image(&test_descriptor("a.png", 400, 300), 0, &mut source);
    assert!(editor.is_loading());
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    assert!(editor.annotations().is_empty());

    // a newer request supersedes the first one
    let t2 = editor.load_image(&test_descriptor("b.png", 200, 100), 1, &mut source);
    assert!(t2 > t1);
    assert!(!editor.on_image_ready(t1, Ok(test_image(400, 300))));
    assert!(!editor.is_ready());
    assert!(editor.on_image_ready(t2, Ok(test_image(200, 100))));
    assert_eq!(editor.current_key(), Some("b.png"));
    assert_eq!(editor.current_index(), Some(1));
    assert!(!editor.on_image_ready(t2, Ok(test_image(200, 100))));

    // while the next image loads the previous one stays but is frozen
    draw(&mut editor, (10.0, 10.0), (100.0, 90.0));
    assert_eq!(editor.current_annotations().len(), 1);
    let t3 = editor.load_image(&test_descriptor("c.png", 10, 10), 2, &mut source);
    draw(&mut editor, (10.0, 10.0), (100.0, 90.0));
    assert_eq!(editor.current_annotations().len(), 1);
    let broken: yololib::YoloResult<DecodedImage> = Err(yololib::yoloerr!("broken"));
    assert!(!editor.on_image_ready(t3, broken));
    assert_eq!(editor.current_key(), Some("b.png"));
    assert!(editor.is_ready());
    assert_eq!(source.started.len(), 3);
    assert_eq!(source.started[0], (LoadTicket(1), "a.png".to_string()));
}

#[test]
fn test_navigate() {
    let mut editor = make_test_editor(labels(&["a"]));
    editor.set_images(vec![
        test_descriptor("a.png", 40, 30),
        test_descriptor("b.png", 50, 30),
    ]);
    let mut source = ImmediateSource::default();
    editor.navigate_to_image(1, &mut source).unwrap();
    assert!(editor.poll_images(&mut source));
    assert_eq!(editor.current_key(), Some("b.png"));
    assert_eq!(editor.viewport().unwrap().shape_orig, ShapeI::new(50, 30));
    assert!(editor.navigate_to_image(2, &mut source).is_err());
    // selection is reset when the image changes
    editor
        .add_annotation(BbF::from_arr(&[0.0, 0.0, 20.0, 20.0]), "a", 1.0)
        .unwrap();
    editor.press_key(KeyCode::S);
    click(&mut editor, 10.0, 10.0);
    assert_eq!(editor.state().selected, Some(0));
    editor.navigate_to_image(0, &mut source).unwrap();
    assert!(editor.poll_images(&mut source));
    assert_eq!(editor.state().selected, None);
    assert_eq!(editor.state().mode, Mode::Select);
    assert!(editor.current_annotations().is_empty());
}

#[test]
fn test_hover_and_leave() {
    let mut editor = make_test_editor(labels(&["a"]));
    load_test_image(&mut editor, "a.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    mv(&mut editor, 50.0, 50.0);
    assert_eq!(editor.state().hovered, Some(0));
    let hover = editor.cfg().colors.hover;
    assert_eq!(editor.surface().strokes()[0].1, hover);
    editor.handle_input(EditorInput::PointerLeave);
    assert_eq!(editor.state().hovered, None);
    assert_eq!(editor.surface().strokes()[0].1, editor.cfg().colors.saved);
}

#[test]
fn test_mouse_and_touch_adapters() {
    let origin = PtF { x: 100.0, y: 50.0 };
    let mut editor = make_test_editor(labels(&["mouse", "touch"]));
    load_test_image(&mut editor, "a.png", 400, 300);
    let m = |x, y| MouseInput {
        client_x: x,
        client_y: y,
    };
    editor.handle_mouse(MousePhase::Down, m(110.0, 60.0), origin);
    editor.handle_mouse(MousePhase::Move, m(160.0, 110.0), origin);
    editor.handle_mouse(MousePhase::Up, m(160.0, 110.0), origin);
    assert_eq!(
        editor.current_annotations()[0].bb(),
        BbF::from_arr(&[10.0, 10.0, 50.0, 50.0])
    );

    let t = |x, y| TouchInput {
        touches: vec![(x, y)],
    };
    editor.handle_touch(TouchPhase::Start, &t(300.0, 200.0), origin);
    editor.handle_touch(TouchPhase::Move, &t(400.0, 300.0), origin);
    editor.handle_touch(TouchPhase::End, &TouchInput::default(), origin);
    assert_eq!(editor.current_annotations().len(), 2);
    assert_eq!(
        editor.current_annotations()[1].bb(),
        BbF::from_arr(&[200.0, 150.0, 100.0, 100.0])
    );

    let cfg = EditorCfg {
        enable_touch: false,
        ..EditorCfg::default()
    };
    let mut editor = AnnotationEditor::new(
        cfg,
        MemoryStore::new(),
        labels(&["touch"]),
        RecordingSurface::default(),
    );
    load_test_image(&mut editor, "a.png", 400, 300);
    editor.handle_touch(TouchPhase::Start, &t(110.0, 60.0), origin);
    editor.handle_touch(TouchPhase::Move, &t(200.0, 200.0), origin);
    editor.handle_touch(TouchPhase::End, &TouchInput::default(), origin);
    assert!(editor.annotations().is_empty());
}

#[test]
fn test_pointer_clamped_to_canvas() {
    let mut editor = make_test_editor(labels(&["edge"]));
    load_test_image(&mut editor, "a.png", 1600, 1200);
    draw(&mut editor, (-50.0, -50.0), (900.0, 100.0));
    let anno = &editor.current_annotations()[0];
    assert_eq!(anno.bb(), BbF::from_arr(&[0.0, 0.0, 1600.0, 200.0]));
    assert!(anno.validate().is_ok());
}

#[test]
fn test_quick_save_and_edit_api() {
    let mut editor = make_test_editor(labels(&["a"]));
    load_test_image(&mut editor, "a.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    editor.press_key(KeyCode::Enter);
    let notes = editor.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Info);

    editor
        .set_annotation_rect(0, BbF::from_arr(&[350.0, 250.0, 100.0, 100.0]))
        .unwrap();
    assert_eq!(
        editor.current_annotations()[0].bb(),
        BbF::from_arr(&[350.0, 250.0, 50.0, 50.0])
    );
    assert!(editor
        .set_annotation_rect(0, BbF::from_arr(&[1.0, 1.0, 0.0, 5.0]))
        .is_err());
    assert!(editor
        .set_annotation_rect(3, BbF::from_arr(&[1.0, 1.0, 5.0, 5.0]))
        .is_err());
    editor.relabel(0, " b ").unwrap();
    assert_eq!(editor.current_annotations()[0].label, "b");
    assert!(editor.relabel(0, "").is_err());
    assert_eq!(&stored(&editor), editor.annotations());
}

#[test]
fn test_failed_import_leaves_annotations() {
    init_tracing_for_tests();
    let mut editor = make_test_editor(labels(&["a"]));
    load_test_image(&mut editor, "a.png", 400, 300);
    draw(&mut editor, (10.0, 10.0), (100.0, 100.0));
    let before = editor.annotations().clone();
    for broken in ["{\"metadata\": {}}", "not json", "{\"annotations\": [1, 2]}"] {
        assert!(!editor.import_annotations(broken));
        assert_eq!(editor.annotations(), &before);
        let notes = editor.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotificationLevel::Error);
    }
}

#[test]
fn test_ids_stay_unique_after_max_id_import() {
    init_tracing_for_tests();
    let mut editor = make_test_editor(labels(&["b", "c"]));
    load_test_image(&mut editor, "a.png", 400, 300);
    let doc = r#"{"annotations": {"a.png": [
        {"id": 18446744073709551615, "x": 0, "y": 0, "width": 20, "height": 20, "label": "a"},
        {"id": 3, "x": -1, "y": 0, "width": 20, "height": 20, "label": "broken"}
    ]}}"#;
    assert!(editor.import_annotations(doc));
    assert_eq!(editor.current_annotations().len(), 1);
    assert_eq!(editor.current_annotations()[0].id, u64::MAX);
    draw(&mut editor, (50.0, 50.0), (100.0, 100.0));
    draw(&mut editor, (150.0, 150.0), (200.0, 200.0));
    let mut ids = editor
        .current_annotations()
        .iter()
        .map(|a| a.id)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, u64::MAX]);
    assert_eq!(&stored(&editor), editor.annotations());
}

#[test]
fn test_auto_annotate() {
    let mut suggest = |_: &DecodedImage| {
        vec![
            Suggestion {
                bb: BbF::from_arr(&[100.0, 100.0, 200.0, 150.0]),
                label: "auto".into(),
                confidence: 0.85,
            },
            Suggestion {
                bb: BbF::from_arr(&[0.0, 0.0, 10.0, 10.0]),
                label: "unsure".into(),
                confidence: 0.2,
            },
        ]
    };
    let mut editor = make_test_editor(ScriptedLabels::default());
    load_test_image(&mut editor, "a.png", 400, 300);
    assert_eq!(editor.auto_annotate(&mut suggest), 0);
    assert!(editor.annotations().is_empty());
    assert_eq!(editor.take_notifications().len(), 1);

    let cfg = EditorCfg {
        enable_auto_label: true,
        ..EditorCfg::default()
    };
    let mut editor = AnnotationEditor::new(
        cfg,
        MemoryStore::new(),
        ScriptedLabels::default(),
        RecordingSurface::default(),
    );
    load_test_image(&mut editor, "a.png", 400, 300);
    assert_eq!(editor.auto_annotate(&mut suggest), 1);
    let anno = &editor.current_annotations()[0];
    assert_eq!(anno.confidence, 0.85);
    assert_eq!(editor.surface().texts(), vec!["auto (85.0%)"]);
}
