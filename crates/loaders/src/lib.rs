//! Extension-dispatched content loaders.
//!
//! A [`Registry`] maps a normalised file extension to a [`Loader`]. Lookup
//! falls through caller overrides, the built-in families ([`Builtin`]), a
//! generic mime-table loader, and finally the raw read every registry
//! carries for extensionless files.
//!
//! ```no_run
//! use trawl_loaders::{Options, Registry};
//!
//! # fn example() -> trawl_loaders::error::Result<()> {
//! let registry = Registry::builtin();
//! let content = registry.resolve_path("data/people.csv").load("data/people.csv".as_ref(), &Options::new())?;
//! println!("{} ({})", content, content.kind());
//! # Ok(())
//! # }
//! ```

mod builtin;
mod codec;
mod content;
pub mod error;
mod loader;
mod registry;
mod suggest;

pub use crate::builtin::Builtin;
pub use crate::codec::Codec;
pub use crate::content::{ArchiveEntry, Content, IniDocument, Sheet, Table, XmlElement};
pub use crate::loader::{CustomLoader, LoadFn, Loader, Options, filter_options};
pub use crate::registry::Registry;
pub use crate::suggest::suggest;
