//! The contract between a host inference runtime and its plugins.
//!
//! A plugin goes through
//!
//! ```text
//! Constructed -> Configured -> Initialized (ready) -> Terminated -> destroyed
//! ```
//!
//! `configure_with_format` may be repeated while not initialized, the kernel
//! may be enqueued any number of times once initialized, `terminate` is
//! accepted in any state and `destroy` consumes the instance.
use crate::fields::{FieldCollection, FieldDecl};
use downcast_rs::{Downcast, impl_downcast};
use roialign_core::internal::*;
use roialign_core::ndarray::{ArrayViewD, ArrayViewMutD};
use std::fmt::Debug;

pub type Dims = TVec<usize>;

/// Memory layout of a tensor binding.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PluginFormat {
    /// Row major `[N, C, H, W]`.
    #[default]
    Nchw,
    Nhwc,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PluginState {
    Constructed,
    Configured,
    Initialized,
    Terminated,
}

pub trait Plugin: Debug + Send + Sync + Downcast {
    /// Name of the layer this instance was created for.
    fn layer_name(&self) -> &str;

    fn plugin_type(&self) -> &'static str;

    fn plugin_version(&self) -> &'static str;

    fn nb_outputs(&self) -> usize;

    /// Shape of output `index`, for the given input shapes.
    fn output_dims(&self, index: usize, inputs: &[Dims]) -> RoiResult<Dims>;

    fn supports_format(&self, datum_type: DatumType, format: PluginFormat) -> bool;

    fn configure_with_format(
        &mut self,
        inputs: &[Dims],
        outputs: &[Dims],
        datum_type: DatumType,
        format: PluginFormat,
        max_batch_size: usize,
    ) -> RoiResult<()>;

    fn initialize(&mut self) -> RoiResult<()>;

    fn terminate(&mut self);

    /// Scratch memory needed by `enqueue`, in bytes.
    fn workspace_size(&self, max_batch_size: usize) -> usize;

    /// Run the plugin on caller-owned buffers.
    ///
    /// Without an explicit executor, the work goes to
    /// [`current_executor`](roialign_core::executor::current_executor).
    fn enqueue(
        &self,
        batch_size: usize,
        inputs: &[ArrayViewD<f32>],
        outputs: &mut [ArrayViewMutD<f32>],
        executor: Option<&Executor>,
    ) -> RoiResult<()>;

    fn serialization_size(&self) -> usize;

    fn serialize(&self, buffer: &mut [u8]) -> RoiResult<()>;

    /// Fresh instance with the same parameters, in the constructed state.
    fn clone_plugin(&self) -> Box<dyn Plugin>;

    fn state(&self) -> PluginState;

    fn set_plugin_namespace(&mut self, namespace: &str);

    fn plugin_namespace(&self) -> &str;

    fn destroy(self: Box<Self>);
}
impl_downcast!(Plugin);

/// Factory for one plugin type, as registered with the host.
pub trait PluginCreator: Debug + Send + Sync {
    fn plugin_name(&self) -> &'static str;

    fn plugin_version(&self) -> &'static str;

    fn field_names(&self) -> &'static [FieldDecl];

    fn create_plugin(&self, name: &str, fields: &FieldCollection) -> RoiResult<Box<dyn Plugin>>;

    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> RoiResult<Box<dyn Plugin>>;

    fn set_plugin_namespace(&mut self, namespace: &str);

    fn plugin_namespace(&self) -> &str;
}
