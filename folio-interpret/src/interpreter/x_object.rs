use super::{Interpreter, InterpreterWarning, Sink};
use crate::color::affine_from_array;
use crate::command::{Command, DrawMode, ImageRef};
use crate::error::{DecodeError, ResourceError, Result};
use crate::paint::{Paint, ShadingPaint, ShadingSpace};
use crate::resources::{DictResources, ResourceCategory, ResourceLookup};
use crate::util::lock;
use folio_path::Path;
use folio_syntax::{Name, Object, Stream};
use kurbo::{Affine, Rect};
use log::{debug, warn};
use std::sync::Arc;

impl Interpreter {
    pub(super) fn x_object(&mut self, name: &Name) -> Result<()> {
        let obj = self.find_resource(name, ResourceCategory::XObject)?;
        let Some(stream) = obj.as_stream() else {
            warn!("XObject {name} is not a stream");

            return Ok(());
        };

        match stream.dict().get_name(b"Subtype").map(Name::as_bytes) {
            Some(b"Image") => self.draw_image(stream),
            Some(b"Form") => self.draw_form(stream)?,
            subtype => warn!("unsupported XObject subtype {subtype:?}"),
        }

        Ok(())
    }

    pub(super) fn draw_image(&mut self, stream: &Stream) {
        if let Some(image) = stream.id().and_then(|id| self.cache.image(id)) {
            self.emit(Command::DrawImage(image));

            return;
        }

        match self.settings.images.decode(stream, self.objects.as_ref()) {
            Ok(data) => {
                let image = ImageRef::new(data);

                if let Some(id) = stream.id() {
                    lock(&self.cache.images).insert(id, image.clone());
                }

                self.emit(Command::DrawImage(image));
            }
            Err(e) => self.warn(InterpreterWarning::ImageDecodeFailure(e)),
        }
    }

    fn draw_form(&mut self, stream: &Stream) -> Result<()> {
        if self.form_depth >= self.settings.max_form_depth {
            return Err(ResourceError::FormTooDeep(self.settings.max_form_depth).into());
        }

        let dict = stream.dict();
        let bbox = dict
            .get(b"BBox")
            .and_then(|b| self.objects.array(b))
            .and_then(|b| rect_from_array(&b))
            .ok_or(ResourceError::MissingKey {
                key: "BBox",
                owner: "form XObject",
            })?;
        let matrix = dict
            .get(b"Matrix")
            .and_then(|m| self.objects.array(m))
            .and_then(|m| affine_from_array(&m))
            .unwrap_or(Affine::IDENTITY);

        let commands = match stream.id().and_then(|id| self.cache.form(id)) {
            Some(commands) => {
                debug!("reusing cached form {:?}", stream.id());

                commands
            }
            None => match self.interpret_form(stream)? {
                Some(commands) => commands,
                None => return Ok(()),
            },
        };

        self.emit(Command::Push);
        self.emit(Command::Transform(matrix));
        self.emit(Command::DrawPath(Path::from_rect(bbox), DrawMode::CLIP));

        for command in commands.iter() {
            self.sink.push(command.clone());
        }

        self.emit(Command::Pop);

        Ok(())
    }

    /// Interpret the content of a form with the current state, returning
    /// `None` if its content cannot be decoded.
    fn interpret_form(&mut self, stream: &Stream) -> Result<Option<Arc<[Arc<Command>]>>> {
        let filters = stream.filters();
        let Some(content) = self.objects.stream_bytes(stream, &filters) else {
            self.warn(InterpreterWarning::ContentDecodeFailure(
                DecodeError::UnsupportedFilter(filters.to_vec()),
            ));

            return Ok(None);
        };

        let resources: Arc<dyn ResourceLookup> = match stream
            .dict()
            .get(b"Resources")
            .map(|r| self.objects.resolve_object(r))
        {
            Some(Object::Dict(dict)) => Arc::new(
                DictResources::new(dict, self.objects.clone()).with_parent(self.resources.clone()),
            ),
            _ => self.resources.clone(),
        };

        let mut form = Self::with_sink(
            content,
            resources,
            self.objects.clone(),
            self.settings.clone(),
            Sink::Local(vec![]),
            self.state.get().clone(),
            self.cache.clone(),
            self.form_depth + 1,
        );
        let commands: Arc<[Arc<Command>]> = form.run_local()?.into();

        if let Some(id) = stream.id() {
            lock(&self.cache.forms).insert(id, commands.clone());
        }

        Ok(Some(commands))
    }

    pub(super) fn shading(&mut self, name: &Name) -> Result<()> {
        let obj = self.find_resource(name, ResourceCategory::Shading)?;
        let bbox = match &obj {
            Object::Dict(dict) => Some(dict),
            Object::Stream(stream) => Some(stream.dict()),
            _ => None,
        }
        .and_then(|dict| dict.get(b"BBox"))
        .and_then(|b| self.objects.array(b))
        .and_then(|b| rect_from_array(&b));

        let Some(bbox) = bbox else {
            debug!("shading {name} has no bounding box");
            self.warn(InterpreterWarning::UnsupportedShading);

            return Ok(());
        };

        let Some(shader) = self
            .settings
            .paints
            .paint_for_shading(&obj, self.objects.as_ref())
        else {
            self.warn(InterpreterWarning::UnsupportedShading);

            return Ok(());
        };

        self.emit(Command::Push);
        self.emit(Command::SetFillPaint(Paint::Shading(ShadingPaint {
            shader,
            matrix: Affine::IDENTITY,
            space: ShadingSpace::User,
        })));
        self.emit(Command::DrawPath(Path::from_rect(bbox), DrawMode::FILL));
        self.emit(Command::Pop);

        Ok(())
    }
}

fn rect_from_array(a: &[Object]) -> Option<Rect> {
    let [x0, y0, x1, y1] = a else {
        return None;
    };

    Some(
        Rect::new(
            x0.as_number()?,
            y0.as_number()?,
            x1.as_number()?,
            y1.as_number()?,
        )
        .abs(),
    )
}
