//! Hook contexts.
//!
//! Each [`Filter`](crate::core::node::Filter) hook receives a context that
//! exposes exactly what that pass may look at and change. Information and
//! region contexts work on staged copies, so a failing hook leaves the
//! pipeline untouched. The generate context hands out locked views of the
//! real buffers.

use crate::core::data::{DataHandle, DataInformation, DataKind, DataObject, Image, Payload, Pixel};
use crate::core::error::{ExecutionError, NodeId};
use crate::core::region::Region;
use crate::core::types::Value;
use crate::execution::progress::CancellationToken;
use indexmap::IndexMap;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard};

// ============================================================================
// Parameters
// ============================================================================

/// Resolved parameter values of one node.
#[derive(Debug, Clone)]
pub struct Parameters {
    node_id: NodeId,
    values: IndexMap<String, Value>,
}

impl Parameters {
    /// Wrap the values of a node.
    pub fn new(node_id: NodeId, values: IndexMap<String, Value>) -> Self {
        Self { node_id, values }
    }

    /// ID of the owning node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// All values.
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Get a parameter value by name.
    pub fn get(&self, name: &str) -> Result<&Value, ExecutionError> {
        self.values
            .get(name)
            .ok_or_else(|| ExecutionError::MissingParameter {
                node_id: self.node_id,
                parameter: name.to_string(),
            })
    }

    /// Build an invalid parameter error for `name`.
    pub fn invalid(&self, name: &str, error: impl Into<String>) -> ExecutionError {
        ExecutionError::InvalidParameter {
            node_id: self.node_id,
            parameter: name.to_string(),
            error: error.into(),
        }
    }

    /// Get a parameter as an integer.
    pub fn get_integer(&self, name: &str) -> Result<i64, ExecutionError> {
        self.get(name)?
            .as_integer()
            .ok_or_else(|| self.invalid(name, "not an integer"))
    }

    /// Get a parameter as a non-negative integer.
    pub fn get_usize(&self, name: &str) -> Result<usize, ExecutionError> {
        let v = self.get_integer(name)?;
        usize::try_from(v).map_err(|_| self.invalid(name, format!("{} is negative", v)))
    }

    /// Get a parameter as a float.
    pub fn get_float(&self, name: &str) -> Result<f64, ExecutionError> {
        self.get(name)?
            .as_float()
            .ok_or_else(|| self.invalid(name, "not a number"))
    }

    /// Get a parameter as a boolean.
    pub fn get_bool(&self, name: &str) -> Result<bool, ExecutionError> {
        self.get(name)?
            .as_bool()
            .ok_or_else(|| self.invalid(name, "not a boolean"))
    }

    /// Get a parameter as a string.
    pub fn get_string(&self, name: &str) -> Result<&str, ExecutionError> {
        self.get(name)?
            .as_string()
            .ok_or_else(|| self.invalid(name, "not a string"))
    }

    /// Get a parameter as a list of integers.
    pub fn get_integer_list(&self, name: &str) -> Result<Vec<i64>, ExecutionError> {
        self.get(name)?
            .as_integer_list()
            .ok_or_else(|| self.invalid(name, "not a list of integers"))
    }

    /// Get a parameter as a list of non-negative integers.
    pub fn get_usize_list(&self, name: &str) -> Result<Vec<usize>, ExecutionError> {
        self.get_integer_list(name)?
            .into_iter()
            .map(|v| usize::try_from(v).map_err(|_| self.invalid(name, format!("{} is negative", v))))
            .collect()
    }

    /// Get a parameter as a list of floats.
    pub fn get_float_list(&self, name: &str) -> Result<Vec<f64>, ExecutionError> {
        self.get(name)?
            .as_float_list()
            .ok_or_else(|| self.invalid(name, "not a list of numbers"))
    }
}

// ============================================================================
// Information Pass
// ============================================================================

/// Context of [`Filter::generate_output_information`](crate::core::node::Filter::generate_output_information).
#[derive(Debug)]
pub struct InformationContext<'a> {
    node_id: NodeId,
    params: &'a Parameters,
    input_names: Vec<String>,
    inputs: Vec<Option<DataInformation>>,
    outputs: Vec<Option<DataInformation>>,
    output_kinds: Vec<DataKind>,
}

impl<'a> InformationContext<'a> {
    pub(crate) fn new(
        params: &'a Parameters,
        input_names: Vec<String>,
        inputs: Vec<Option<DataInformation>>,
        output_kinds: Vec<DataKind>,
    ) -> Self {
        Self {
            node_id: params.node_id(),
            params,
            input_names,
            inputs,
            outputs: vec![None; output_kinds.len()],
            output_kinds,
        }
    }

    /// ID of the node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Parameter values.
    pub fn params(&self) -> &Parameters {
        self.params
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output slots.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Information of a bound input.
    pub fn input_information(&self, slot: usize) -> Result<&DataInformation, ExecutionError> {
        self.inputs
            .get(slot)
            .and_then(|i| i.as_ref())
            .ok_or_else(|| ExecutionError::MissingInput {
                node_id: self.node_id,
                slot: self
                    .input_names
                    .get(slot)
                    .cloned()
                    .unwrap_or_else(|| slot.to_string()),
            })
    }

    /// Information of an input that may be unbound.
    pub fn optional_input_information(&self, slot: usize) -> Option<&DataInformation> {
        self.inputs.get(slot).and_then(|i| i.as_ref())
    }

    /// Publish the information of an output.
    pub fn set_output_information(&mut self, index: usize, information: DataInformation) {
        if let Some(slot) = self.outputs.get_mut(index) {
            *slot = Some(information);
        }
    }

    /// Copy the information of input 0 to every output, using each
    /// output's declared kind.
    pub fn copy_primary_information(&mut self) -> Result<(), ExecutionError> {
        let primary = self.input_information(0)?.clone();
        for (index, kind) in self.output_kinds.clone().into_iter().enumerate() {
            let information = match kind {
                DataKind::Any => primary.clone(),
                kind => primary.clone().with_kind(kind),
            };
            self.set_output_information(index, information);
        }
        Ok(())
    }

    pub(crate) fn into_outputs(self) -> Result<Vec<DataInformation>, ExecutionError> {
        let node_id = self.node_id;
        self.outputs
            .into_iter()
            .enumerate()
            .map(|(output, info)| info.ok_or(ExecutionError::OutputNotSet { node_id, output }))
            .collect()
    }
}

// ============================================================================
// Requested-Region Pass
// ============================================================================

/// Context of the two region hooks of a filter.
#[derive(Debug)]
pub struct RegionContext<'a> {
    node_id: NodeId,
    params: &'a Parameters,
    output_information: &'a [DataInformation],
    output_requests: Vec<Region>,
    input_information: Vec<Option<DataInformation>>,
    input_requests: Vec<Option<Region>>,
}

impl<'a> RegionContext<'a> {
    pub(crate) fn new(
        params: &'a Parameters,
        output_information: &'a [DataInformation],
        output_requests: Vec<Region>,
        input_information: Vec<Option<DataInformation>>,
    ) -> Self {
        let input_requests = vec![None; input_information.len()];
        Self {
            node_id: params.node_id(),
            params,
            output_information,
            output_requests,
            input_information,
            input_requests,
        }
    }

    /// ID of the node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Parameter values.
    pub fn params(&self) -> &Parameters {
        self.params
    }

    /// Number of input slots.
    pub fn input_count(&self) -> usize {
        self.input_information.len()
    }

    /// Region currently requested of an output.
    pub fn output_requested_region(&self, index: usize) -> &Region {
        &self.output_requests[index]
    }

    /// Replace the region requested of an output.
    pub fn set_output_requested_region(&mut self, index: usize, region: Region) {
        if let Some(slot) = self.output_requests.get_mut(index) {
            *slot = region;
        }
    }

    /// Largest possible region of an output.
    pub fn output_largest_region(&self, index: usize) -> &Region {
        &self.output_information[index].largest_region
    }

    /// Information of an input, `None` if the slot is unbound.
    pub fn input_information(&self, slot: usize) -> Option<&DataInformation> {
        self.input_information.get(slot).and_then(|i| i.as_ref())
    }

    /// Largest possible region of an input, `None` if the slot is unbound.
    pub fn input_largest_region(&self, slot: usize) -> Option<&Region> {
        self.input_information(slot).map(|i| &i.largest_region)
    }

    /// Declare the region needed from an input.
    pub fn set_input_requested_region(&mut self, slot: usize, region: Region) {
        if let Some(request) = self.input_requests.get_mut(slot) {
            *request = Some(region);
        }
    }

    /// Ask every bound input for the region requested of `output`.
    ///
    /// Inputs whose dimension differs from that region are asked for their
    /// largest possible region instead.
    pub fn request_inputs_like_output(&mut self, output: usize) {
        let Some(wanted) = self.output_requests.get(output).cloned() else {
            return;
        };
        for slot in 0..self.input_information.len() {
            let Some(largest) = self.input_largest_region(slot).cloned() else {
                continue;
            };
            let request = if largest.dimension() == wanted.dimension() {
                wanted.clone()
            } else {
                largest
            };
            self.input_requests[slot] = Some(request);
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Region>, Vec<Option<Region>>) {
        (self.output_requests, self.input_requests)
    }
}

// ============================================================================
// Execution Pass
// ============================================================================

/// Context of [`Filter::generate_data`](crate::core::node::Filter::generate_data).
pub struct GenerateContext<'a> {
    node_id: NodeId,
    params: &'a Parameters,
    input_names: Vec<String>,
    inputs: &'a [Option<DataHandle>],
    input_regions: Vec<Option<Region>>,
    outputs: &'a [DataHandle],
    output_regions: Vec<Region>,
    cancellation: Option<&'a CancellationToken>,
}

impl<'a> GenerateContext<'a> {
    pub(crate) fn new(
        params: &'a Parameters,
        input_names: Vec<String>,
        inputs: &'a [Option<DataHandle>],
        input_regions: Vec<Option<Region>>,
        outputs: &'a [DataHandle],
        output_regions: Vec<Region>,
        cancellation: Option<&'a CancellationToken>,
    ) -> Self {
        Self {
            node_id: params.node_id(),
            params,
            input_names,
            inputs,
            input_regions,
            outputs,
            output_regions,
            cancellation,
        }
    }

    /// ID of the node.
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Parameter values.
    pub fn params(&self) -> &Parameters {
        self.params
    }

    /// Region to generate for an output.
    pub fn output_region(&self, index: usize) -> &Region {
        &self.output_regions[index]
    }

    /// Region requested of an input, `None` if unbound.
    pub fn input_region(&self, slot: usize) -> Option<&Region> {
        self.input_regions.get(slot).and_then(|r| r.as_ref())
    }

    /// Whether an input slot is bound.
    pub fn has_input(&self, slot: usize) -> bool {
        matches!(self.inputs.get(slot), Some(Some(_)))
    }

    /// Largest possible region of a bound input.
    pub fn input_largest_region(&self, slot: usize) -> Result<Region, ExecutionError> {
        let handle = self.input_handle(slot)?;
        let object = handle.read_recursive();
        object
            .largest_possible_region()
            .cloned()
            .ok_or_else(|| self.missing_input(slot))
    }

    /// Read access to the payload of an input.
    pub fn input<T: Payload>(&self, slot: usize) -> Result<MappedRwLockReadGuard<'a, T>, ExecutionError> {
        let handle = self.input_handle(slot)?;
        RwLockReadGuard::try_map(handle.read_recursive(), DataObject::payload_as::<T>)
            .map_err(|_| self.wrong_type(slot, std::any::type_name::<T>()))
    }

    /// Read access to an input image.
    pub fn input_image<P: Pixel>(
        &self,
        slot: usize,
    ) -> Result<MappedRwLockReadGuard<'a, Image<P>>, ExecutionError> {
        self.input::<Image<P>>(slot)
    }

    /// Write access to the payload of an output.
    pub fn output<T: Payload>(&self, index: usize) -> Result<MappedRwLockWriteGuard<'a, T>, ExecutionError> {
        let outputs: &'a [DataHandle] = self.outputs;
        let handle = outputs
            .get(index)
            .ok_or(ExecutionError::OutputNotSet {
                node_id: self.node_id,
                output: index,
            })?;
        RwLockWriteGuard::try_map(handle.write(), DataObject::payload_mut_untracked::<T>).map_err(
            |_| ExecutionError::WrongDataType {
                node_id: self.node_id,
                slot: format!("output {}", index),
                expected: std::any::type_name::<T>().to_string(),
            },
        )
    }

    /// Write access to an output image.
    pub fn output_image<P: Pixel>(
        &self,
        index: usize,
    ) -> Result<MappedRwLockWriteGuard<'a, Image<P>>, ExecutionError> {
        self.output::<Image<P>>(index)
    }

    /// A computation failure attributed to this node and its output region.
    pub fn failure(&self, error: impl Into<String>) -> ExecutionError {
        ExecutionError::ComputationFailure {
            node_id: self.node_id,
            region: self.output_regions.first().cloned(),
            error: error.into(),
        }
    }

    /// Whether the update has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(|c| c.is_cancelled())
    }

    /// Check cancellation and return error if cancelled.
    pub fn check_cancelled(&self) -> Result<(), ExecutionError> {
        if self.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn input_handle(&self, slot: usize) -> Result<&'a DataHandle, ExecutionError> {
        let inputs: &'a [Option<DataHandle>] = self.inputs;
        inputs
            .get(slot)
            .and_then(|h| h.as_ref())
            .ok_or_else(|| self.missing_input(slot))
    }

    fn slot_name(&self, slot: usize) -> String {
        self.input_names
            .get(slot)
            .cloned()
            .unwrap_or_else(|| slot.to_string())
    }

    fn missing_input(&self, slot: usize) -> ExecutionError {
        ExecutionError::MissingInput {
            node_id: self.node_id,
            slot: self.slot_name(slot),
        }
    }

    fn wrong_type(&self, slot: usize, expected: &str) -> ExecutionError {
        ExecutionError::WrongDataType {
            node_id: self.node_id,
            slot: self.slot_name(slot),
            expected: expected.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataKind, OutputRef, PixelType};

    fn params() -> Parameters {
        let mut values = IndexMap::new();
        values.insert("radius".to_string(), Value::Integer(2));
        values.insert("negative".to_string(), Value::Integer(-3));
        values.insert("size".to_string(), Value::from(vec![4i64, 5]));
        values.insert("gain".to_string(), Value::Float(1.5));
        Parameters::new(NodeId::new(), values)
    }

    #[test]
    fn test_parameter_getters() {
        let p = params();
        assert_eq!(p.get_usize("radius").unwrap(), 2);
        assert_eq!(p.get_float("radius").unwrap(), 2.0);
        assert_eq!(p.get_usize_list("size").unwrap(), vec![4, 5]);
        assert_eq!(p.get_float("gain").unwrap(), 1.5);
        assert!(matches!(
            p.get_usize("negative"),
            Err(ExecutionError::InvalidParameter { .. })
        ));
        assert!(matches!(
            p.get_float("missing"),
            Err(ExecutionError::MissingParameter { .. })
        ));
        assert!(p.get_bool("gain").is_err());
    }

    #[test]
    fn test_information_copy_uses_output_kind() {
        let p = params();
        let input = DataInformation::image(PixelType::U8, Region::from_size(&[3, 3]))
            .with_spacing(vec![0.5, 2.0]);
        let mut ctx = InformationContext::new(
            &p,
            vec!["input".to_string()],
            vec![Some(input)],
            vec![DataKind::Image(PixelType::F32), DataKind::Any],
        );
        ctx.copy_primary_information().unwrap();
        let outputs = ctx.into_outputs().unwrap();
        assert_eq!(outputs[0].kind, DataKind::Image(PixelType::F32));
        assert_eq!(outputs[0].spacing, vec![0.5, 2.0]);
        assert_eq!(outputs[1].kind, DataKind::Image(PixelType::U8));
    }

    #[test]
    fn test_information_unset_output() {
        let p = params();
        let ctx = InformationContext::new(&p, Vec::new(), Vec::new(), vec![DataKind::Summary]);
        assert!(matches!(
            ctx.into_outputs(),
            Err(ExecutionError::OutputNotSet { output: 0, .. })
        ));
    }

    #[test]
    fn test_request_inputs_like_output() {
        let p = params();
        let outputs = vec![DataInformation::image(PixelType::U8, Region::from_size(&[8, 8]))];
        let wanted = Region::new(vec![2, 2], vec![3, 3]).unwrap();
        let mut ctx = RegionContext::new(
            &p,
            &outputs,
            vec![wanted.clone()],
            vec![
                Some(DataInformation::image(PixelType::U8, Region::from_size(&[8, 8]))),
                None,
                Some(DataInformation::image(PixelType::U8, Region::from_size(&[8]))),
            ],
        );
        ctx.request_inputs_like_output(0);
        let (out, inputs) = ctx.into_parts();
        assert_eq!(out[0], wanted);
        assert_eq!(inputs[0], Some(wanted));
        assert_eq!(inputs[1], None);
        assert_eq!(inputs[2], Some(Region::from_size(&[8])));
    }

    #[test]
    fn test_generate_context_access() {
        let p = params();
        let region = Region::from_size(&[2, 2]);
        let input = DataHandle::from_image(Image::<u8>::from_fn(region.clone(), |idx| {
            (idx[0] + 2 * idx[1]) as u8
        }));
        let inputs = vec![Some(input), None];

        let node_id = p.node_id();
        let mut object = DataObject::for_output(OutputRef { node_id, index: 0 });
        object.set_information(DataInformation::image(PixelType::U8, region.clone()));
        object.allocate(&region).unwrap();
        let outputs = vec![DataHandle::new(object)];

        let token = CancellationToken::new();
        let ctx = GenerateContext::new(
            &p,
            vec!["input".to_string(), "mask".to_string()],
            &inputs,
            vec![Some(region.clone()), None],
            &outputs,
            vec![region.clone()],
            Some(&token),
        );

        {
            let src = ctx.input_image::<u8>(0).unwrap();
            let mut dst = ctx.output_image::<u8>(0).unwrap();
            for (d, s) in dst.as_mut_slice().iter_mut().zip(src.as_slice()) {
                *d = s * 10;
            }
        }
        assert_eq!(outputs[0].image::<u8>().unwrap().as_slice(), &[0, 10, 20, 30]);

        assert!(ctx.has_input(0));
        assert!(!ctx.has_input(1));
        assert!(matches!(
            ctx.input_image::<u8>(1),
            Err(ExecutionError::MissingInput { .. })
        ));
        assert!(matches!(
            ctx.input_image::<f32>(0),
            Err(ExecutionError::WrongDataType { .. })
        ));

        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(ExecutionError::Cancelled)));

        let failure = ctx.failure("bad input");
        assert!(matches!(
            failure,
            ExecutionError::ComputationFailure { region: Some(_), .. }
        ));
    }
}
