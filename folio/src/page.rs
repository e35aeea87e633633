//! Pages that are parsed once and rendered on demand.

use crate::RenderSettings;
use crate::cache::{CacheSettings, ImageRequestKey, RenderCache};
use crate::raster::Raster;
use crate::renderer::{Renderer, Rotation, initial_transform};
use crate::util::lock;
use folio_interpret::{
    Command, CommandBuffer, InterpretError, Interpreter, InterpreterSettings, ResourceLookup,
    SharedTask, TaskState, Watchable, spawn_worker,
};
use folio_syntax::ObjectModel;
use kurbo::Rect;
use log::debug;
use std::sync::{Arc, Mutex};

enum Parser {
    /// The content has not been parsed yet.
    Pending,
    Started(SharedTask<Interpreter>),
    /// Commands are added by hand.
    Manual,
}

/// A page whose content is parsed into commands once, and rendered into
/// rasters of any size on request.
///
/// Parsing starts with the first request for an image. Rendered rasters are
/// kept in a [`RenderCache`], so that repeated requests for the same image
/// are cheap and concurrent requests share one renderer.
pub struct Page {
    content: Arc<[u8]>,
    resources: Arc<dyn ResourceLookup>,
    objects: Arc<dyn ObjectModel>,
    media_box: Rect,
    rotation: Rotation,
    interpreter_settings: InterpreterSettings,
    render_settings: RenderSettings,
    buffer: Arc<CommandBuffer>,
    parser: Mutex<Parser>,
    cache: RenderCache,
}

impl Page {
    /// Create a page from its content stream.
    pub fn new(
        content: impl Into<Arc<[u8]>>,
        resources: Arc<dyn ResourceLookup>,
        objects: Arc<dyn ObjectModel>,
        media_box: Rect,
    ) -> Self {
        Self {
            content: content.into(),
            resources,
            objects,
            media_box: media_box.abs(),
            rotation: Rotation::None,
            interpreter_settings: InterpreterSettings::default(),
            render_settings: RenderSettings::default(),
            buffer: CommandBuffer::shared(),
            parser: Mutex::new(Parser::Pending),
            cache: RenderCache::default(),
        }
    }

    /// Create a page without content, whose commands are added with
    /// [`Page::add_command`] and completed with [`Page::finish`].
    pub fn from_commands(objects: Arc<dyn ObjectModel>, media_box: Rect) -> Self {
        let resources = Arc::new(folio_interpret::DictResources::empty(objects.clone()));
        let page = Self::new(Vec::new(), resources, objects, media_box);
        *lock(&page.parser) = Parser::Manual;

        page
    }

    /// Set the rotation of the page.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the settings used when parsing the content.
    #[must_use]
    pub fn with_interpreter_settings(mut self, settings: InterpreterSettings) -> Self {
        self.interpreter_settings = settings;
        self
    }

    /// Set the settings used by renderers.
    #[must_use]
    pub fn with_render_settings(mut self, settings: RenderSettings) -> Self {
        self.render_settings = settings;
        self
    }

    /// Set the settings of the render cache.
    #[must_use]
    pub fn with_cache_settings(mut self, settings: CacheSettings) -> Self {
        self.cache = RenderCache::new(settings);
        self
    }

    /// The media box in page space.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// The rotation of the page.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// The size of the page in page units, after rotation.
    pub fn size(&self) -> (f64, f64) {
        let (w, h) = (self.media_box.width(), self.media_box.height());

        if self.rotation.is_sideways() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// The commands of the page.
    pub fn commands(&self) -> &Arc<CommandBuffer> {
        &self.buffer
    }

    /// The cache of rendered rasters.
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// The error that stopped parsing, if any.
    pub fn parse_error(&self) -> Option<InterpretError> {
        match &*lock(&self.parser) {
            Parser::Started(parser) => lock(parser).error().cloned(),
            Parser::Pending | Parser::Manual => None,
        }
    }

    /// Render the page, or the part of it inside `clip`, into a raster of
    /// `width` by `height` pixels.
    ///
    /// `clip` is given in page space. If `wait` is true, parsing and
    /// rendering are driven on the calling thread until the raster is
    /// complete. Otherwise they run on worker threads, and the returned
    /// raster fills up over time. In both cases, a raster that is already
    /// cached or in progress is returned as is. Whether the background is
    /// drawn is decided by the first request for an image.
    pub fn get_image(
        &self,
        width: u16,
        height: u16,
        clip: Option<Rect>,
        draw_background: bool,
        wait: bool,
    ) -> Arc<Raster> {
        let parser = self.start_parser(!wait);
        let key = self.key(width, height, clip);
        let transform = initial_transform(
            clip.unwrap_or(self.media_box),
            self.rotation,
            width,
            height,
        );

        let lookup = self.cache.get_or_create(key, |raster| {
            Renderer::new(
                self.buffer.clone(),
                raster,
                transform,
                draw_background,
                self.render_settings.clone(),
            )
        });

        if wait {
            if let Some(parser) = parser {
                let state = lock(&parser).run();
                debug!("parser finished with {state:?}");
            }

            if let Some(renderer) = &lookup.renderer {
                let state = lock(renderer).run();

                if state == TaskState::NeedsData {
                    debug!("page is still missing commands");
                }
            }
        } else if lookup.created
            && let Some(renderer) = lookup.renderer
        {
            spawn_worker(renderer);
        }

        lookup.raster
    }

    /// Stop rendering the image requested with the given arguments.
    /// Returns whether a renderer was still running.
    pub fn stop(&self, width: u16, height: u16, clip: Option<Rect>) -> bool {
        self.cache.stop(&self.key(width, height, clip))
    }

    /// Append a command to the page. Returns `false` if the page is
    /// already finished.
    pub fn add_command(&self, command: Command) -> bool {
        self.buffer.append(command)
    }

    /// Mark the commands of the page as complete.
    pub fn finish(&self) {
        self.buffer.finish();
    }

    /// Whether all commands of the page are known.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_finished()
    }

    /// Discard all commands and rendered rasters. Pages with content parse
    /// it again with the next request for an image.
    pub fn reparse(&self) {
        let mut parser = lock(&self.parser);

        if let Parser::Started(task) = &*parser {
            let mut task = lock(task);
            task.stop();
            // Steps the parser into its final state while we hold the lock,
            // so that it cannot append to the buffer anymore.
            task.step();
        }

        self.cache.clear();
        self.buffer.clear();

        if !matches!(*parser, Parser::Manual) {
            *parser = Parser::Pending;
        }
    }

    fn key(&self, width: u16, height: u16, clip: Option<Rect>) -> ImageRequestKey {
        ImageRequestKey {
            width,
            height,
            clip,
            rotation: self.rotation,
        }
    }

    /// Start parsing the content if that has not happened yet, on a worker
    /// thread if `spawn` is true. Returns the parser, if there is one.
    fn start_parser(&self, spawn: bool) -> Option<SharedTask<Interpreter>> {
        let mut parser = lock(&self.parser);

        match &*parser {
            Parser::Manual => None,
            Parser::Started(task) => Some(task.clone()),
            Parser::Pending => {
                let task = Watchable::shared(Interpreter::new(
                    self.content.clone(),
                    self.resources.clone(),
                    self.objects.clone(),
                    &self.buffer,
                    self.interpreter_settings.clone(),
                ));

                if spawn {
                    spawn_worker(task.clone());
                }

                *parser = Parser::Started(task.clone());

                Some(task)
            }
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // A worker keeps parsing for as long as any renderer holds the buffer.
        if let Parser::Started(task) = &*lock(&self.parser) {
            lock(task).stop();
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("media_box", &self.media_box)
            .field("rotation", &self.rotation)
            .field("commands", &self.buffer.len())
            .field("finished", &self.buffer.is_finished())
            .finish_non_exhaustive()
    }
}
