//! # ROIAlignPlugin
//!
//! Host-facing wrapper around [`roialign_core`]: a creator building the
//! plugin from named fields or from its serialized form, the plugin lifecycle
//! (configure, initialize, enqueue, terminate), and a registry where hosts
//! look creators up by name and version.
//!
//! ```
//! # use roialign_plugin::prelude::*;
//! # fn main() -> RoiResult<()> {
//! register_default_creators();
//! let creator = creator("ROIAlignPlugin", "1", "").unwrap();
//! let fields = FieldCollection::new()
//!     .with("output_height", 7)
//!     .with("output_width", 7)
//!     .with("spatial_scale", 0.0625f32);
//! let plugin = creator.create_plugin("roi_pool", &fields)?;
//! let dims = plugin.output_dims(0, &[tvec![1, 256, 38, 50], tvec![300, 4]])?;
//! assert_eq!(&*dims, &[300, 256, 7, 7]);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate log;

pub mod fields;
pub mod plugin;
pub mod registry;
pub mod roi_align;

pub use roialign_core;

pub mod prelude {
    pub use crate::fields::{FieldCollection, FieldDecl, FieldType, FieldValue, PluginField};
    pub use crate::plugin::{Dims, Plugin, PluginCreator, PluginFormat, PluginState};
    pub use crate::registry::{creator, creators, register_creator, register_default_creators};
    pub use crate::roi_align::{RoiAlignPlugin, RoiAlignPluginCreator};
    pub use roialign_core::prelude::*;
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("ROIALIGN_LOG").is_test(true).try_init();
}
