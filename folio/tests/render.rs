use folio::{GraphicsState, Page, Raster, RenderSettings, Renderer, Rotation};
use folio_interpret::{
    Color, Command, CommandBuffer, DictResources, DrawMode, InterpreterSettings, Paint, TaskState,
    Watchable, interpret_to_vec,
};
use folio_path::Path;
use folio_syntax::{Dict, MemoryObjects, Object, ObjectModel};
use kurbo::{Affine, Rect};
use std::sync::Arc;

const PAGE: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

fn parse_dict(data: &[u8]) -> Dict {
    Object::from_bytes(data).unwrap().as_dict().unwrap().clone()
}

fn page_with(content: &[u8], resources: Dict) -> Page {
    let objects: Arc<dyn ObjectModel> = Arc::new(MemoryObjects::new());
    let resources = Arc::new(DictResources::new(resources, objects.clone()));

    Page::new(content.to_vec(), resources, objects, PAGE)
}

fn render(content: &[u8]) -> Arc<Raster> {
    page_with(content, Dict::new()).get_image(100, 100, None, true, true)
}

fn commands(content: &[u8]) -> Vec<Arc<Command>> {
    let objects: Arc<dyn ObjectModel> = Arc::new(MemoryObjects::new());
    let resources = Arc::new(DictResources::empty(objects.clone()));

    interpret_to_vec(
        content.to_vec(),
        resources,
        objects,
        InterpreterSettings::default(),
    )
    .unwrap()
}

/// A renderer for a finished buffer holding the commands of `content`.
fn renderer(content: &[u8]) -> (Renderer, Arc<Raster>) {
    let buffer = CommandBuffer::shared();

    for command in commands(content) {
        buffer.append_shared(command);
    }

    buffer.finish();

    let raster = Arc::new(Raster::new(100, 100));
    let renderer = Renderer::new(
        buffer,
        &raster,
        Affine::IDENTITY,
        false,
        RenderSettings::default(),
    );

    (renderer, raster)
}

const WHITE: [u8; 4] = [255, 255, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

#[test]
fn transforms_are_restored() {
    let (renderer, _raster) = renderer(b"q 2 0 0 2 0 0 cm 1 0 0 1 5 5 cm Q");
    let mut task = Watchable::new(renderer);

    assert_eq!(task.run(), TaskState::Completed);
    assert_eq!(task.task().state().transform, Affine::IDENTITY);
    assert_eq!(task.task().position(), 4);
}

#[test]
fn states_are_restored_exactly() {
    let content = b"0 0 1 RG 3 w [4 2] 1 d 0 0 80 80 re W n 0.5 CA \
        q 1 0 0 rg 0 1 0 RG 10 w 1 J 2 j 5 M [] 0 d 0.25 ca 0.75 CA \
        3 0 0 3 10 10 cm 0 0 10 10 re W* f q 0 0 5 5 re W n Q Q";
    let commands = commands(content);
    let (mut renderer, _raster) = renderer(b"");

    let outer = commands
        .iter()
        .position(|c| **c == Command::Push)
        .unwrap();

    for command in &commands[..outer] {
        renderer.execute(command);
    }

    let before: GraphicsState = renderer.state().clone();
    assert_eq!(before.clip_depth, 1);

    for command in &commands[outer..] {
        renderer.execute(command);

        if renderer.depth() == 0 {
            assert_eq!(renderer.state(), &before);
        }
    }

    assert_eq!(renderer.state(), &before);
    assert_eq!(renderer.state().stroke.width, 3.0);
    assert_eq!(renderer.state().stroke_alpha, 0.5);
}

#[test]
fn waits_for_commands_until_finished() {
    let buffer = CommandBuffer::shared();
    let raster = Arc::new(Raster::new(10, 10));
    let mut task = Watchable::new(Renderer::new(
        buffer.clone(),
        &raster,
        Affine::IDENTITY,
        true,
        RenderSettings::default(),
    ));

    assert_eq!(task.step(), TaskState::NeedsData);
    assert_eq!(task.step(), TaskState::NeedsData);
    assert!(!raster.is_complete());

    buffer.finish();

    assert_eq!(task.step(), TaskState::Completed);
    assert!(raster.is_complete());
    assert_eq!(raster.pixel(5, 5), Some(WHITE));
}

#[test]
fn stops_without_raster() {
    let (renderer, raster) = renderer(b"0 0 10 10 re f");
    let mut task = Watchable::new(renderer);

    drop(raster);

    assert_eq!(task.step(), TaskState::Stopped);
    assert_eq!(task.task().position(), 0);
}

#[test]
fn filled_rectangles() {
    let raster = render(b"1 0 0 rg 10 10 30 30 re f");

    assert!(raster.is_complete());
    assert_eq!(raster.width(), 100);
    // Page space is flipped.
    assert_eq!(raster.pixel(20, 75), Some(RED));
    assert_eq!(raster.pixel(20, 25), Some(WHITE));
    assert_eq!(raster.pixel(50, 75), Some(WHITE));
}

#[test]
fn transparent_background() {
    let page = page_with(b"1 0 0 rg 10 10 10 10 re f", Dict::new());
    let raster = page.get_image(100, 100, None, false, true);

    assert_eq!(raster.pixel(0, 0), Some([0, 0, 0, 0]));
    assert_eq!(raster.pixel(15, 85), Some(RED));
    assert_eq!(raster.dirty(), Some(Rect::new(10.0, 80.0, 20.0, 90.0)));
}

#[test]
fn fills_with_constant_alpha() {
    let raster = render(b"0 0 1 rg 0.5 ca 0 0 100 100 re f");
    let [r, g, b, a] = raster.pixel(50, 50).unwrap();

    assert_eq!(a, 255);
    assert_eq!(b, 255);
    assert!((120..=135).contains(&r), "{r}");
    assert_eq!(r, g);
}

#[test]
fn clips_limit_drawing() {
    let raster = render(b"0 0 50 100 re W n 1 0 0 rg 0 0 100 100 re f");

    assert_eq!(raster.pixel(25, 50), Some(RED));
    assert_eq!(raster.pixel(75, 50), Some(WHITE));
}

#[test]
fn restored_clips_no_longer_apply() {
    let raster = render(b"q 0 0 50 100 re W n Q 1 0 0 rg 0 0 100 100 re f");

    assert_eq!(raster.pixel(75, 50), Some(RED));
}

#[test]
fn unbalanced_clips_are_closed() {
    let buffer = CommandBuffer::shared();
    buffer.append(Command::Push);
    buffer.append(Command::DrawPath(
        Path::from_rect(Rect::new(0.0, 0.0, 50.0, 100.0)),
        DrawMode::CLIP,
    ));
    buffer.append(Command::SetFillPaint(Paint::Solid(Color::new(1.0, 0.0, 0.0))));
    buffer.append(Command::DrawPath(Path::from_rect(PAGE), DrawMode::FILL));
    buffer.finish();

    let raster = Arc::new(Raster::new(100, 100));
    let mut task = Watchable::new(Renderer::new(
        buffer,
        &raster,
        Affine::IDENTITY,
        false,
        RenderSettings::default(),
    ));

    assert_eq!(task.run(), TaskState::Completed);
    assert_eq!(raster.pixel(25, 50), Some(RED));
    assert_eq!(raster.pixel(75, 50), Some([0, 0, 0, 0]));
}

#[test]
fn hairlines_stay_visible() {
    let raster = render(b"0 w 10 50 m 90 50 l S");

    let above = raster.pixel(50, 49).unwrap();
    let below = raster.pixel(50, 50).unwrap();
    assert!(above[0] < 200 && below[0] < 200, "{above:?} {below:?}");
    assert_eq!(raster.pixel(50, 45), Some(WHITE));

    // Scaled down far below a pixel.
    let raster = render(b"0.001 0 0 0.001 0 0 cm 2 w 10000 50000 m 90000 50000 l S");
    let above = raster.pixel(50, 49).unwrap();
    let below = raster.pixel(50, 50).unwrap();
    assert!(above[0] < 200 && below[0] < 200, "{above:?} {below:?}");
}

#[test]
fn hairlines_under_non_uniform_scaling() {
    // Squashed vertically, a vertical line keeps its full device width of
    // one pixel and must not be widened.
    let raster = render(b"1 0 0 0.01 0 0 cm 1 w 50 0 m 50 10000 l S");
    let covered = (0..100)
        .filter(|&x| raster.pixel(x, 50) != Some(WHITE))
        .count();
    assert!(covered <= 3, "covered columns on row 50: {covered}");
    assert_ne!(raster.pixel(50, 50), Some(WHITE));

    // A horizontal line under the same transform is far thinner than a
    // pixel and is widened to one.
    let raster = render(b"1 0 0 0.01 0 0 cm 0.1 w 0 5000 m 100 5000 l S");
    let covered = (0..100)
        .filter(|&y| raster.pixel(50, y) != Some(WHITE))
        .count();
    assert!((1..=3).contains(&covered), "covered rows in column 50: {covered}");
}

#[test]
fn strokes_are_drawn_around_the_path() {
    let raster = render(b"0 0 1 RG 10 w 20 20 60 60 re S");

    // On the edge, inside and outside of it.
    assert_eq!(raster.pixel(50, 20), Some(BLUE));
    assert_eq!(raster.pixel(50, 16), Some(BLUE));
    assert_eq!(raster.pixel(50, 23), Some(BLUE));
    assert_eq!(raster.pixel(50, 50), Some(WHITE));
    assert_eq!(raster.pixel(50, 10), Some(WHITE));
}

#[test]
fn dashed_strokes_leave_gaps() {
    let raster = render(b"4 w [10 10] 0 d 0 50 m 100 50 l S");

    assert_eq!(raster.pixel(5, 50), Some([0, 0, 0, 255]));
    assert_eq!(raster.pixel(15, 50), Some(WHITE));
    assert_eq!(raster.pixel(25, 50), Some([0, 0, 0, 255]));
}

#[test]
fn seams_between_adjacent_fills_are_hidden() {
    let content = b"10 10 40.5 80 re f 50.5 10 40 80 re f";

    let raster = render(content);
    assert!(raster.pixel(50, 50).unwrap()[0] < 10);

    let page = page_with(content, Dict::new()).with_render_settings(RenderSettings {
        seam_correction: false,
        ..RenderSettings::default()
    });
    let raster = page.get_image(100, 100, None, true, true);
    assert!(raster.pixel(50, 50).unwrap()[0] > 30);
}

#[test]
fn images_fill_the_unit_square() {
    let raster = render(
        b"q 100 0 0 100 0 0 cm BI /W 2 /H 1 /CS /RGB /BPC 8 ID \xff\x10\x10\x10\x10\xff EI Q",
    );

    let [r, _, b, _] = raster.pixel(25, 50).unwrap();
    assert!(r > 240 && b < 30);
    let [r, _, b, _] = raster.pixel(75, 50).unwrap();
    assert!(r < 30 && b > 240);
}

#[test]
fn stencil_masks_use_the_fill_color() {
    // One row of two pixels, only the left one is painted.
    let raster = render(b"0 0 1 rg q 100 0 0 100 0 0 cm BI /W 2 /H 1 /IM true ID \x7f EI Q");

    assert_eq!(raster.pixel(25, 50), Some(BLUE));
    assert_eq!(raster.pixel(75, 50), Some(WHITE));
}

#[test]
fn axial_shadings() {
    let resources = parse_dict(
        b"<< /Shading << /Sh1 << /ShadingType 2 /ColorSpace /DeviceRGB /Coords [0 0 100 0] \
        /Function << /FunctionType 2 /Domain [0 1] /C0 [1 0 0] /C1 [0 0 1] /N 1 >> \
        /BBox [0 0 100 100] >> >> >>",
    );
    let raster = page_with(b"/Sh1 sh", resources).get_image(100, 100, None, true, true);

    let [r, _, b, _] = raster.pixel(2, 50).unwrap();
    assert!(r > 240 && b < 15, "{r} {b}");
    let [r, _, b, _] = raster.pixel(97, 50).unwrap();
    assert!(r < 15 && b > 240, "{r} {b}");
    let [r, _, b, _] = raster.pixel(50, 50).unwrap();
    assert!(r.abs_diff(b) < 10, "{r} {b}");
}

#[test]
fn rotated_pages() {
    // The bottom left quarter of the page.
    let content = b"1 0 0 rg 0 0 50 50 re f";

    let upright = page_with(content, Dict::new());
    let raster = upright.get_image(100, 100, None, true, true);
    assert_eq!(raster.pixel(25, 75), Some(RED));
    assert_eq!(raster.pixel(25, 25), Some(WHITE));

    let rotated = page_with(content, Dict::new()).with_rotation(Rotation::Quarter);
    let raster = rotated.get_image(100, 100, None, true, true);
    assert_eq!(raster.pixel(25, 25), Some(RED));
    assert_eq!(raster.pixel(25, 75), Some(WHITE));

    let rotated = page_with(content, Dict::new()).with_rotation(Rotation::Half);
    let raster = rotated.get_image(100, 100, None, true, true);
    assert_eq!(raster.pixel(75, 25), Some(RED));
}

#[test]
fn clipped_requests_show_part_of_the_page() {
    let page = page_with(b"1 0 0 rg 0 0 50 50 re f", Dict::new());
    let raster = page.get_image(20, 20, Some(Rect::new(40.0, 40.0, 60.0, 60.0)), true, true);

    // The lower left quarter of the clip is red.
    assert_eq!(raster.pixel(5, 15), Some(RED));
    assert_eq!(raster.pixel(15, 5), Some(WHITE));
}

#[test]
fn commands_before_errors_are_rendered() {
    let page = page_with(b"1 0 0 rg 0 0 100 100 re f ZZ 0 0 1 rg 0 0 100 100 re f", Dict::new());
    let raster = page.get_image(10, 10, None, true, true);

    assert!(raster.is_complete());
    assert_eq!(raster.pixel(5, 5), Some(RED));
    assert!(page.parse_error().is_some());
}

#[test]
fn png_export() {
    let png = render(b"1 0 0 rg 0 0 50 50 re f").to_png().unwrap();

    assert_eq!(&png[1..4], b"PNG");
}
