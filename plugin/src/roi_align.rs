use crate::fields::{FieldCollection, FieldDecl, FieldType};
use crate::plugin::{Dims, Plugin, PluginCreator, PluginFormat, PluginState};
use roialign_core::executor::current_executor;
use roialign_core::geometry::infer_output_shape;
use roialign_core::internal::*;
use roialign_core::ndarray::{ArrayViewD, ArrayViewMutD};

pub const ROI_ALIGN_PLUGIN_NAME: &str = "ROIAlignPlugin";
pub const ROI_ALIGN_PLUGIN_VERSION: &str = "1";

/// Fields understood by [`RoiAlignPluginCreator`].
pub static FIELD_DECLS: &[FieldDecl] = &[
    FieldDecl { name: "output_height", field_type: FieldType::Int32, required: true },
    FieldDecl { name: "output_width", field_type: FieldType::Int32, required: true },
    FieldDecl { name: "spatial_scale", field_type: FieldType::Float32, required: true },
    FieldDecl { name: "sample_ratio", field_type: FieldType::Int32, required: false },
    FieldDecl { name: "position_sensitive", field_type: FieldType::Int32, required: false },
    FieldDecl { name: "mode", field_type: FieldType::Int32, required: false },
];

/// Bind a field collection to validated parameters.
///
/// `sample_ratio` defaults to 0 (adaptive), `position_sensitive` to false,
/// `mode` to 0 (average). Unknown fields are ignored, missing required ones
/// are all reported at once.
pub fn bind_params(fields: &FieldCollection) -> RoiResult<RoiAlignParams> {
    for name in fields.names() {
        if !FIELD_DECLS.iter().any(|d| d.name == name) {
            warn!("{ROI_ALIGN_PLUGIN_NAME}: ignoring unknown field '{name}'");
        }
    }
    let missing: Vec<&str> = FIELD_DECLS
        .iter()
        .filter(|decl| decl.required && fields.field(decl.name).is_none())
        .map(|decl| decl.name)
        .collect();
    if !missing.is_empty() {
        return Err(RoiAlignError::configuration(format!(
            "required fields are missing: {}",
            missing.join(", ")
        ))
        .into());
    }
    let mode = PoolMode::supported(fields.get_field_opt::<i32>("mode")?.unwrap_or(0))?;
    let params = RoiAlignParams {
        pooled_height: fields.get_field("output_height")?,
        pooled_width: fields.get_field("output_width")?,
        spatial_scale: fields.get_field("spatial_scale")?,
        sample_ratio: fields.get_field_opt("sample_ratio")?.unwrap_or(0),
        position_sensitive: fields.get_field_opt("position_sensitive")?.unwrap_or(false),
        mode,
    };
    params.validate()?;
    Ok(params)
}

#[derive(Debug)]
pub struct RoiAlignPlugin {
    layer_name: String,
    params: RoiAlignParams,
    namespace: String,
    state: PluginState,
    op: Option<RoiAlign>,
    input_volume: usize,
}

impl RoiAlignPlugin {
    pub fn new(name: impl Into<String>, params: RoiAlignParams) -> RoiResult<RoiAlignPlugin> {
        params.validate()?;
        Ok(RoiAlignPlugin {
            layer_name: name.into(),
            params,
            namespace: String::new(),
            state: PluginState::Constructed,
            op: None,
            input_volume: 0,
        })
    }

    /// Rebuild a plugin from the bytes written by [`Plugin::serialize`].
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> RoiResult<RoiAlignPlugin> {
        RoiAlignPlugin::new(name, RoiAlignParams::deserialize(data)?)
    }

    pub fn params(&self) -> &RoiAlignParams {
        &self.params
    }

    /// Dimensions derived at configuration time, if configured.
    pub fn geometry(&self) -> Option<&RoiAlignGeometry> {
        self.op.as_ref().map(|op| &op.geometry)
    }

    pub fn input_volume(&self) -> usize {
        self.input_volume
    }

    fn check_format(&self, datum_type: DatumType, format: PluginFormat) -> RoiResult<()> {
        if !self.supports_format(datum_type, format) {
            if datum_type != DatumType::F32 {
                return Err(RoiAlignError::format(datum_type).into());
            }
            return Err(RoiAlignError::Format(format!(
                "{format:?} layout is not supported, expected Nchw"
            ))
            .into());
        }
        Ok(())
    }
}

impl Plugin for RoiAlignPlugin {
    fn layer_name(&self) -> &str {
        &self.layer_name
    }

    fn plugin_type(&self) -> &'static str {
        ROI_ALIGN_PLUGIN_NAME
    }

    fn plugin_version(&self) -> &'static str {
        ROI_ALIGN_PLUGIN_VERSION
    }

    fn nb_outputs(&self) -> usize {
        1
    }

    fn output_dims(&self, index: usize, inputs: &[Dims]) -> RoiResult<Dims> {
        ensure!(index == 0, RoiAlignError::shape(format!("no output #{index}, only #0")));
        ensure!(
            inputs.len() == 2,
            RoiAlignError::shape(format!(
                "expected 2 inputs (feature map, ROIs), got {}",
                inputs.len()
            ))
        );
        infer_output_shape(&self.params, &inputs[0], &inputs[1])
    }

    fn supports_format(&self, datum_type: DatumType, format: PluginFormat) -> bool {
        datum_type == DatumType::F32 && format == PluginFormat::Nchw
    }

    fn configure_with_format(
        &mut self,
        inputs: &[Dims],
        outputs: &[Dims],
        datum_type: DatumType,
        format: PluginFormat,
        max_batch_size: usize,
    ) -> RoiResult<()> {
        if self.state == PluginState::Initialized {
            return Err(RoiAlignError::state(format!(
                "{}: can not reconfigure an initialized plugin, terminate it first",
                self.layer_name
            ))
            .into());
        }
        self.check_format(datum_type, format)?;
        ensure!(
            inputs.len() == 2,
            RoiAlignError::shape(format!(
                "expected 2 inputs (feature map, ROIs), got {}",
                inputs.len()
            ))
        );
        ensure!(
            outputs.len() == 1,
            RoiAlignError::shape(format!("expected 1 output, got {}", outputs.len()))
        );
        let geometry = RoiAlignGeometry::from_shapes(&self.params, &inputs[0], &inputs[1])
            .with_context(|| format!("Configuring {}", self.layer_name))?;
        geometry.check_output(&outputs[0])?;
        debug!(
            "{} configured: {:?} x {:?} -> {:?} (max batch {max_batch_size})",
            self.layer_name,
            inputs[0],
            inputs[1],
            geometry.output_shape()
        );
        self.input_volume = geometry.input_volume();
        self.op = Some(RoiAlign::new(self.params, geometry));
        self.state = PluginState::Configured;
        Ok(())
    }

    fn initialize(&mut self) -> RoiResult<()> {
        match self.state {
            PluginState::Configured | PluginState::Terminated if self.op.is_some() => {
                debug!("{} initialized", self.layer_name);
                self.state = PluginState::Initialized;
                Ok(())
            }
            PluginState::Initialized => Ok(()),
            state => Err(RoiAlignError::state(format!(
                "{}: initialize requires a configured plugin, state is {state:?}",
                self.layer_name
            ))
            .into()),
        }
    }

    fn terminate(&mut self) {
        debug!("{} terminated (was {:?})", self.layer_name, self.state);
        self.state = PluginState::Terminated;
    }

    fn workspace_size(&self, _max_batch_size: usize) -> usize {
        0
    }

    fn enqueue(
        &self,
        batch_size: usize,
        inputs: &[ArrayViewD<f32>],
        outputs: &mut [ArrayViewMutD<f32>],
        executor: Option<&Executor>,
    ) -> RoiResult<()> {
        let op = match (&self.op, self.state) {
            (Some(op), PluginState::Initialized) => op,
            (_, state) => {
                return Err(RoiAlignError::state(format!(
                    "{}: enqueue requires an initialized plugin, state is {state:?}",
                    self.layer_name
                ))
                .into());
            }
        };
        ensure!(
            inputs.len() == 2 && outputs.len() == 1,
            RoiAlignError::shape(format!(
                "expected 2 inputs and 1 output, got {} and {}",
                inputs.len(),
                outputs.len()
            ))
        );
        let fallback;
        let executor = match executor {
            Some(executor) => executor,
            None => {
                fallback = current_executor();
                &fallback
            }
        };
        trace!(
            "{} enqueue (batch {batch_size}, {})",
            self.layer_name,
            if executor.is_multithread() { "thread pool" } else { "caller thread" }
        );
        op.eval(inputs[0].view(), inputs[1].view(), outputs[0].view_mut(), executor)
    }

    fn serialization_size(&self) -> usize {
        RoiAlignParams::SERIALIZED_LEN
    }

    fn serialize(&self, buffer: &mut [u8]) -> RoiResult<()> {
        self.params.serialize_into(buffer)?;
        Ok(())
    }

    fn clone_plugin(&self) -> Box<dyn Plugin> {
        let mut clone = RoiAlignPlugin {
            layer_name: self.layer_name.clone(),
            params: self.params,
            namespace: String::new(),
            state: PluginState::Constructed,
            op: None,
            input_volume: 0,
        };
        clone.set_plugin_namespace(&self.namespace);
        Box::new(clone)
    }

    fn state(&self) -> PluginState {
        self.state
    }

    fn set_plugin_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    fn plugin_namespace(&self) -> &str {
        &self.namespace
    }

    fn destroy(self: Box<Self>) {
        debug!("{} destroyed", self.layer_name);
    }
}

#[derive(Debug, Default, Clone)]
pub struct RoiAlignPluginCreator {
    namespace: String,
}

impl RoiAlignPluginCreator {
    pub fn new() -> RoiAlignPluginCreator {
        RoiAlignPluginCreator::default()
    }
}

impl PluginCreator for RoiAlignPluginCreator {
    fn plugin_name(&self) -> &'static str {
        ROI_ALIGN_PLUGIN_NAME
    }

    fn plugin_version(&self) -> &'static str {
        ROI_ALIGN_PLUGIN_VERSION
    }

    fn field_names(&self) -> &'static [FieldDecl] {
        FIELD_DECLS
    }

    fn create_plugin(&self, name: &str, fields: &FieldCollection) -> RoiResult<Box<dyn Plugin>> {
        let params = bind_params(fields).with_context(|| format!("Creating {name}"))?;
        debug!("Creating {name} with {params:?}");
        let mut plugin = RoiAlignPlugin::new(name, params)?;
        plugin.set_plugin_namespace(&self.namespace);
        Ok(Box::new(plugin))
    }

    fn deserialize_plugin(&self, name: &str, data: &[u8]) -> RoiResult<Box<dyn Plugin>> {
        let mut plugin =
            RoiAlignPlugin::from_bytes(name, data).with_context(|| format!("Deserializing {name}"))?;
        plugin.set_plugin_namespace(&self.namespace);
        Ok(Box::new(plugin))
    }

    fn set_plugin_namespace(&mut self, namespace: &str) {
        self.namespace = namespace.to_string();
    }

    fn plugin_namespace(&self) -> &str {
        &self.namespace
    }
}
