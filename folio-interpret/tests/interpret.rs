use folio_interpret::{
    Color, Command, CommandBuffer, DecodeError, DictResources, DrawMode, FontProvider, Glyph,
    ImagePixels, InterpretError, Interpreter, InterpreterSettings, InterpreterWarning, Paint,
    ParseError, ResourceCategory, ResourceError, TaskState, Watchable, interpret_to_vec,
};
use folio_path::{FillRule, Path};
use folio_syntax::{Dict, MemoryObjects, Name, Object, ObjectModel, Stream, SyntaxError};
use kurbo::{Affine, Rect};
use std::sync::{Arc, Mutex};

fn run(content: &[u8]) -> Result<Vec<Arc<Command>>, InterpretError> {
    run_with(content, Dict::new(), MemoryObjects::new(), InterpreterSettings::default())
}

fn run_with(
    content: &[u8],
    resources: Dict,
    objects: MemoryObjects,
    settings: InterpreterSettings,
) -> Result<Vec<Arc<Command>>, InterpretError> {
    let objects: Arc<dyn ObjectModel> = Arc::new(objects);
    let resources = Arc::new(DictResources::new(resources, objects.clone()));

    interpret_to_vec(content.to_vec(), resources, objects, settings)
}

fn commands(content: &[u8]) -> Vec<Command> {
    run(content)
        .unwrap()
        .iter()
        .map(|c| Command::clone(c))
        .collect()
}

fn collect_warnings() -> (InterpreterSettings, Arc<Mutex<Vec<InterpreterWarning>>>) {
    let warnings = Arc::new(Mutex::new(vec![]));
    let sink = warnings.clone();
    let settings = InterpreterSettings {
        warning_sink: Arc::new(move |w| sink.lock().unwrap().push(w)),
        ..InterpreterSettings::default()
    };

    (settings, warnings)
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Path {
    Path::from_rect(Rect::new(x0, y0, x1, y1))
}

fn parse_dict(data: &[u8]) -> Dict {
    Object::from_bytes(data).unwrap().as_dict().unwrap().clone()
}

#[test]
fn stroked_rectangle() {
    assert_eq!(
        commands(b"1 0 0 RG 10 10 80 80 re S"),
        vec![
            Command::SetStrokePaint(Paint::Solid(Color::new(1.0, 0.0, 0.0))),
            Command::DrawPath(rect(10.0, 10.0, 90.0, 90.0), DrawMode::STROKE),
        ]
    );
}

#[test]
fn save_and_restore_bracket_transforms() {
    assert_eq!(
        commands(b"q 2 0 0 2 0 0 cm 1 0 0 1 5 5 cm Q"),
        vec![
            Command::Push,
            Command::Transform(Affine::scale(2.0)),
            Command::Transform(Affine::translate((5.0, 5.0))),
            Command::Pop,
        ]
    );
}

#[test]
fn unknown_operators() {
    assert_eq!(
        run(b"0 0 m ZZ"),
        Err(InterpretError::Parse(ParseError::UnknownOperator(
            "ZZ".to_string()
        )))
    );

    assert_eq!(commands(b"BX 1 2 ZZ EX"), vec![]);
}

#[test]
fn commands_before_an_error_remain() {
    let buffer = CommandBuffer::shared();
    let objects: Arc<dyn ObjectModel> = Arc::new(MemoryObjects::new());
    let interpreter = Interpreter::new(
        b"0 g 0 0 5 5 re f 1 m".as_slice(),
        Arc::new(DictResources::empty(objects.clone())),
        objects,
        &buffer,
        InterpreterSettings::default(),
    );

    let mut task = Watchable::new(interpreter);
    assert_eq!(task.run(), TaskState::Stopped);
    assert_eq!(
        task.error(),
        Some(&InterpretError::Parse(ParseError::StackUnderflow {
            op: "m",
            expected: 2,
            found: 1,
        }))
    );

    assert!(buffer.is_finished());
    assert_eq!(buffer.len(), 2);
}

#[test]
fn operand_types_are_checked() {
    let err = run(b"(a) 1 m").unwrap_err();

    assert!(matches!(
        err,
        InterpretError::Parse(ParseError::OperandType { op: "m", index: 0, .. })
    ));

    // Arity errors are fatal even in compatibility sections.
    assert!(run(b"BX 1 l EX").is_err());
}

#[test]
fn deeply_nested_operands_fail() {
    let mut content = b"0 0 m ".to_vec();
    content.extend(b"[".repeat(1000));

    assert_eq!(
        run(&content),
        Err(InterpretError::Parse(ParseError::Syntax(SyntaxError::TooDeep)))
    );
}

#[test]
fn stray_operands_are_dropped() {
    let (settings, warnings) = collect_warnings();
    let commands = run_with(b"1 2 3 w", Dict::new(), MemoryObjects::new(), settings).unwrap();

    assert_eq!(*commands[0], Command::SetStrokeWidth(3.0));
    assert_eq!(
        *warnings.lock().unwrap(),
        vec![InterpreterWarning::StrayOperands { op: "w", count: 2 }]
    );
}

#[test]
fn unbalanced_saves_are_closed() {
    let (settings, warnings) = collect_warnings();
    let commands = run_with(b"Q q q", Dict::new(), MemoryObjects::new(), settings).unwrap();
    let commands = commands.iter().map(|c| Command::clone(c)).collect::<Vec<_>>();

    assert_eq!(
        commands,
        vec![Command::Push, Command::Push, Command::Pop, Command::Pop]
    );
    assert_eq!(
        *warnings.lock().unwrap(),
        vec![InterpreterWarning::UnbalancedRestore]
    );
}

#[test]
fn clip_with_matching_rule_is_combined() {
    let mut clip = rect(0.0, 0.0, 10.0, 10.0);
    clip.set_fill_rule(FillRule::EvenOdd);

    assert_eq!(
        commands(b"0 0 10 10 re W* f* 0 0 10 10 re W* n"),
        vec![
            Command::DrawPath(clip.clone(), DrawMode::FILL | DrawMode::CLIP),
            Command::DrawPath(clip, DrawMode::CLIP),
        ]
    );
}

#[test]
fn clip_with_other_rule_is_split() {
    let fill = rect(0.0, 0.0, 10.0, 10.0);
    let mut clip = fill.clone();
    clip.set_fill_rule(FillRule::EvenOdd);

    assert_eq!(
        commands(b"0 0 10 10 re W* f"),
        vec![
            Command::DrawPath(fill, DrawMode::FILL),
            Command::DrawPath(clip, DrawMode::CLIP),
        ]
    );
}

#[test]
fn empty_paths_draw_nothing() {
    assert_eq!(commands(b"W n S f"), vec![]);
}

#[test]
fn curves_need_a_current_point() {
    let cmds = commands(b"1 1 2 2 v 0 0 m 1 1 2 2 v S");
    let Command::DrawPath(path, _) = &cmds[0] else {
        panic!("expected a path");
    };

    assert_eq!(path.segments().len(), 2);
}

#[test]
fn color_space_operators() {
    let resources = parse_dict(
        b"<< /ColorSpace << /CS0 [/ICCBased << /N 3 >>] /CS1 [/Indexed /DeviceRGB 1 <00ff00ff0000>] >> >>",
    );
    let commands = run_with(
        b"/DeviceCMYK cs /CS0 CS 0 0 1 SC /CS1 cs 1 sc 0.5 g",
        resources,
        MemoryObjects::new(),
        InterpreterSettings::default(),
    )
    .unwrap();
    let commands = commands.iter().map(|c| Command::clone(c)).collect::<Vec<_>>();

    assert_eq!(
        commands,
        vec![
            Command::SetFillPaint(Paint::Solid(Color::BLACK)),
            Command::SetStrokePaint(Paint::Solid(Color::BLACK)),
            Command::SetStrokePaint(Paint::Solid(Color::new(0.0, 0.0, 1.0))),
            Command::SetFillPaint(Paint::Solid(Color::new(0.0, 1.0, 0.0))),
            Command::SetFillPaint(Paint::Solid(Color::new(1.0, 0.0, 0.0))),
            Command::SetFillPaint(Paint::Solid(Color::gray(0.5))),
        ]
    );
}

#[test]
fn missing_resources_are_fatal() {
    assert_eq!(
        run(b"/Fm0 Do"),
        Err(InterpretError::Resource(ResourceError::Missing {
            category: ResourceCategory::XObject,
            name: Name::from("Fm0"),
        }))
    );
}

#[test]
fn extended_graphics_state() {
    let resources = parse_dict(b"<< /ExtGState << /G0 << /LW 3 /CA 0.5 /D [[2 1] 0] /BM /Normal >> >> >>");
    let commands = run_with(
        b"/G0 gs",
        resources,
        MemoryObjects::new(),
        InterpreterSettings::default(),
    )
    .unwrap();

    assert_eq!(*commands[0], Command::SetStrokeWidth(3.0));
    assert!(matches!(*commands[1], Command::SetStrokeDash(Some(_))));
    assert_eq!(*commands[2], Command::SetStrokeAlpha(0.5));
    assert_eq!(commands.len(), 3);
}

fn form_objects(content: &[u8]) -> (Dict, MemoryObjects) {
    let mut objects = MemoryObjects::new();
    let form = Stream::new(
        parse_dict(b"<< /Type /XObject /Subtype /Form /BBox [0 0 10 10] /Matrix [1 0 0 1 5 5] >>"),
        content.to_vec(),
    );
    let id = objects.insert(Object::Stream(form));
    let resources = Dict::new().with(
        "XObject",
        Object::Dict(Dict::new().with("Fm0", Object::Ref(id))),
    );

    (resources, objects)
}

#[test]
fn forms_are_spliced_and_cached() {
    let (resources, objects) = form_objects(b"0 0 1 rg 0 0 10 10 re f");
    let commands = run_with(
        b"/Fm0 Do /Fm0 Do",
        resources,
        objects,
        InterpreterSettings::default(),
    )
    .unwrap();

    assert_eq!(commands.len(), 12);
    assert_eq!(*commands[0], Command::Push);
    assert_eq!(
        *commands[1],
        Command::Transform(Affine::translate((5.0, 5.0)))
    );
    assert_eq!(
        *commands[2],
        Command::DrawPath(rect(0.0, 0.0, 10.0, 10.0), DrawMode::CLIP)
    );
    assert_eq!(
        *commands[3],
        Command::SetFillPaint(Paint::Solid(Color::new(0.0, 0.0, 1.0)))
    );
    assert_eq!(*commands[5], Command::Pop);

    // The second invocation reuses the commands of the first.
    assert!(Arc::ptr_eq(&commands[3], &commands[9]));
    assert!(Arc::ptr_eq(&commands[4], &commands[10]));
}

#[test]
fn recursive_forms_fail() {
    let (resources, objects) = form_objects(b"/Fm0 Do");

    assert_eq!(
        run_with(b"/Fm0 Do", resources, objects, InterpreterSettings::default()),
        Err(InterpretError::Resource(ResourceError::FormTooDeep(32)))
    );
}

#[test]
fn inline_images() {
    let cmds = commands(b"q BI /W 2 /H 1 /CS /RGB /BPC 8 ID \xff\x00\x00\x00\xff\x00 EI Q");

    assert_eq!(cmds.len(), 3);
    let Command::DrawImage(image) = &cmds[1] else {
        panic!("expected an image");
    };

    assert_eq!((image.width, image.height), (2, 1));
    assert_eq!(image.pixels, ImagePixels::Rgb(vec![255, 0, 0, 0, 255, 0]));
}

#[test]
fn inline_image_masks_default_to_stencils() {
    let cmds = commands(b"BI /W 8 /H 1 /IM true ID \x0f EI");
    let Command::DrawImage(image) = &cmds[0] else {
        panic!("expected an image");
    };

    assert_eq!(
        image.pixels,
        ImagePixels::Stencil(vec![255, 255, 255, 255, 0, 0, 0, 0])
    );
}

#[test]
fn truncated_inline_images() {
    assert!(matches!(
        run(b"BI /W 2 /H 2 ID \x00"),
        Err(InterpretError::Parse(ParseError::InlineImage(_)))
    ));

    let (settings, warnings) = collect_warnings();
    let commands = run_with(
        b"BI /W 4 /H 4 /CS /G /BPC 8 ID \x00\x00 EI",
        Dict::new(),
        MemoryObjects::new(),
        settings,
    )
    .unwrap();

    assert!(commands.is_empty());
    assert!(matches!(
        warnings.lock().unwrap()[0],
        InterpreterWarning::ImageDecodeFailure(DecodeError::TruncatedData { .. })
    ));
}

/// A font whose glyphs are squares filling the whole em box.
struct Squares;

impl FontProvider for Squares {
    fn glyphs_for(
        &self,
        _: &Dict,
        text: &[u8],
        _: &dyn ObjectModel,
    ) -> Result<Vec<Glyph>, DecodeError> {
        Ok(text
            .iter()
            .map(|b| Glyph {
                advance: 500.0,
                path: (*b != b' ').then(|| rect(0.0, 0.0, 1000.0, 1000.0)),
                is_word_space: *b == b' ',
            })
            .collect())
    }
}

fn run_text(content: &[u8]) -> Vec<Command> {
    let settings = InterpreterSettings {
        fonts: Arc::new(Squares),
        ..InterpreterSettings::default()
    };
    let resources = parse_dict(b"<< /Font << /F0 << /Type /Font >> >> >>");

    run_with(content, resources, MemoryObjects::new(), settings)
        .unwrap()
        .iter()
        .map(|c| Command::clone(c))
        .collect()
}

fn bounds(command: &Command) -> Rect {
    match command {
        Command::DrawPath(path, _) => path.bounds().unwrap(),
        _ => panic!("expected a path"),
    }
}

fn assert_rect_eq(a: Rect, b: Rect) {
    let close = |x: f64, y: f64| (x - y).abs() < 1e-9;

    assert!(
        close(a.x0, b.x0) && close(a.y0, b.y0) && close(a.x1, b.x1) && close(a.y1, b.y1),
        "{a:?} != {b:?}"
    );
}

#[test]
fn glyphs_are_placed_by_the_text_matrix() {
    let cmds = run_text(b"BT /F0 10 Tf 1 0 0 1 100 200 Tm 2 Tw (a b) Tj [(a) -1000 (a)] TJ ET");

    assert_eq!(cmds.len(), 4);
    assert_rect_eq(bounds(&cmds[0]), Rect::new(100.0, 200.0, 110.0, 210.0));
    // Advance 5, plus 5 for the space and 2 of word spacing.
    assert_rect_eq(bounds(&cmds[1]), Rect::new(112.0, 200.0, 122.0, 210.0));
    assert_rect_eq(bounds(&cmds[2]), Rect::new(117.0, 200.0, 127.0, 210.0));
    // A negative adjustment moves the next glyph to the right.
    assert_rect_eq(bounds(&cmds[3]), Rect::new(132.0, 200.0, 142.0, 210.0));
}

#[test]
fn text_lines_and_scaling() {
    let cmds = run_text(b"BT /F0 10 Tf 50 Tz 14 TL 0 100 Td (a) ' 2 -3 TD (a) Tj ET");

    assert_rect_eq(bounds(&cmds[0]), Rect::new(0.0, 86.0, 5.0, 96.0));
    assert_rect_eq(bounds(&cmds[1]), Rect::new(2.0, 83.0, 7.0, 93.0));
}

#[test]
fn text_render_modes() {
    let cmds = run_text(b"BT /F0 10 Tf 3 Tr (a) Tj 1 Tr (a) Tj 7 Tr (aa) Tj ET");

    assert_eq!(cmds.len(), 2);
    assert!(matches!(&cmds[0], Command::DrawPath(_, mode) if *mode == DrawMode::STROKE));
    assert!(matches!(&cmds[1], Command::DrawPath(_, mode) if *mode == DrawMode::CLIP));
    assert_rect_eq(bounds(&cmds[1]), Rect::new(10.0, 0.0, 25.0, 10.0));
}

#[test]
fn interpretation_stops_without_target() {
    let buffer = CommandBuffer::shared();
    let objects: Arc<dyn ObjectModel> = Arc::new(MemoryObjects::new());
    let interpreter = Interpreter::new(
        b"q Q q Q".as_slice(),
        Arc::new(DictResources::empty(objects.clone())),
        objects,
        &buffer,
        InterpreterSettings::default(),
    );
    let mut task = Watchable::new(interpreter);

    assert_eq!(task.step(), TaskState::Running);
    assert_eq!(buffer.len(), 1);

    drop(buffer);
    assert_eq!(task.step(), TaskState::Stopped);
    assert!(task.error().is_none());
}
