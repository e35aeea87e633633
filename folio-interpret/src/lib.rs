/*!
A crate for interpreting PDF content streams into drawing commands.

The interpreter does not draw anything itself. It turns the operators of a
content stream into a flat list of [`Command`]s, which a renderer replays
onto a drawing surface. Both sides are resumable [`Task`]s, so that a page
can be parsed and rendered incrementally, in any interleaving:

- [`Interpreter`] reads one object of a content stream per step and appends
  commands to a [`CommandBuffer`].
- [`CommandBuffer`] is the shared, append-only list of commands of a page.
  Readers can wait for more commands through its [`DataSignal`].
- [`Watchable`] wraps a task with its life-cycle state, and [`Scheduler`]
  drives any number of them on one thread. [`spawn_worker`] runs a task on a
  dedicated thread instead.

Fonts, paints and images are pluggable through the [`FontProvider`],
[`PaintProvider`] and [`ImageDecoder`] traits. The defaults cover device
colors, axial and radial shadings and unfiltered image samples, but no glyph
outlines.

## Example
```
use folio_interpret::{Command, DrawMode, InterpreterSettings, interpret_to_vec};
use folio_interpret::resources::DictResources;
use folio_syntax::MemoryObjects;
use std::sync::Arc;

let objects = Arc::new(MemoryObjects::new());
let resources = Arc::new(DictResources::empty(objects.clone()));
let commands = interpret_to_vec(
    b"1 0 0 rg 10 10 50 50 re f".as_slice(),
    resources,
    objects,
    InterpreterSettings::default(),
)
.unwrap();

assert!(matches!(&*commands[1], Command::DrawPath(_, mode) if *mode == DrawMode::FILL));
```

## Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod buffer;
pub mod color;
pub mod command;
pub mod error;
pub mod font;
pub mod image;
pub mod interpreter;
pub mod paint;
pub mod resources;
pub mod scheduler;
pub mod task;

mod shading;
mod state;
mod util;

pub use buffer::{CommandBuffer, Read};
pub use color::{ColorComponents, ColorSpace, DevicePaints, PaintProvider};
pub use command::{Command, DrawMode, ImageData, ImagePixels, ImageRef};
pub use error::{DecodeError, InterpretError, OperandKind, ParseError, ResourceError};
pub use font::{FontProvider, Glyph, WidthsOnly};
pub use image::{ImageDecoder, RawImageDecoder};
pub use interpreter::{
    Interpreter, InterpreterSettings, InterpreterWarning, WarningSinkFn, interpret_to_vec,
};
pub use paint::{Color, Paint, Shader, ShadingPaint, ShadingSpace};
pub use resources::{DictResources, ResourceCategory, ResourceLookup};
pub use scheduler::{Scheduler, TaskId, spawn_worker};
pub use task::{
    DataSignal, SharedTask, StatusHandle, Step, StopHandle, Task, TaskState, Watchable,
};
