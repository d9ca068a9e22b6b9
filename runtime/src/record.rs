//! Operation records: the unit of work consumed by device engines.

use std::sync::atomic::{AtomicU64, Ordering};

use kiln_device::{Buffer, Command, Dims, Fault, Layout};
use kiln_dtype::{DType, Scalar};
use smallvec::SmallVec;

use crate::kernels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Abs,
    Sqrt,
    Exp,
    Log,
    Relu,
}

impl UnaryOp {
    /// Operations without an integer definition.
    pub fn requires_float(self) -> bool {
        matches!(self, Self::Sqrt | Self::Exp | Self::Log)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ReduceOp {
    Sum,
    Prod,
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExtremumOp {
    Max,
    Min,
}

/// What a record computes.
///
/// Output storages, in order, per kind:
/// - `Extremum { values: true }`: `[values, indices]`
/// - `Extremum { values: false }`: `[indices]`
/// - everything else: `[out]`
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Unary(UnaryOp),
    /// Inputs are already broadcast to the output shape.
    Binary(BinaryOp),
    /// Convert `[input]` to the output dtype.
    Cast,
    Copy,
    Fill(Scalar),
    Reduce { op: ReduceOp, axes: Dims },
    Extremum { op: ExtremumOp, axis: usize, values: bool },
    /// `[(m, k), (k, n)] -> (m * n)` in row-major order.
    Matmul,
    /// `[input, index]`, `out[p] = input[p with p[axis] = index[p]]`.
    Gather { axis: usize },
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unary(op) => op.into(),
            Self::Binary(op) => op.into(),
            Self::Cast => "cast",
            Self::Copy => "copy",
            Self::Fill(_) => "fill",
            Self::Reduce { op, .. } => op.into(),
            Self::Extremum { op: ExtremumOp::Max, values: true, .. } => "max",
            Self::Extremum { op: ExtremumOp::Min, values: true, .. } => "min",
            Self::Extremum { op: ExtremumOp::Max, values: false, .. } => "argmax",
            Self::Extremum { op: ExtremumOp::Min, values: false, .. } => "argmin",
            Self::Matmul => "matmul",
            Self::Gather { .. } => "gather",
        }
    }
}

/// A buffer seen through a layout: the input or output of one record.
#[derive(Debug, Clone)]
pub struct StorageRef {
    pub buffer: Buffer,
    pub layout: Layout,
}

impl StorageRef {
    pub fn new(buffer: Buffer, layout: Layout) -> Self {
        Self { buffer, layout }
    }

    pub fn dtype(&self) -> DType {
        self.buffer.dtype()
    }

    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    /// Whether writing through this view touches every element of the buffer.
    pub fn covers_buffer(&self) -> bool {
        self.numel() == self.buffer.len() && !self.layout.may_overlap()
    }
}

/// One enqueued operation.
///
/// Outputs are allocated by the dispatcher before the record is built; the
/// engine fills them in. If any input carries a fault the record copies it to
/// its outputs instead of computing, so garbage never flows downstream. A
/// healthy record that rewrites a whole output buffer clears that buffer's
/// fault.
#[derive(Debug)]
pub struct OperationRecord {
    id: u64,
    kind: OpKind,
    inputs: SmallVec<[StorageRef; 2]>,
    outputs: SmallVec<[StorageRef; 2]>,
}

impl OperationRecord {
    pub fn new(
        kind: OpKind,
        inputs: impl IntoIterator<Item = StorageRef>,
        outputs: impl IntoIterator<Item = StorageRef>,
    ) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);

        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[StorageRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[StorageRef] {
        &self.outputs
    }
}

impl Command for OperationRecord {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn execute(&mut self, timeline: u64) -> Result<(), Fault> {
        if let Some(fault) = self.inputs.iter().find_map(|input| input.buffer.fault()) {
            tracing::trace!(record = self.id, %fault, "propagating upstream fault");
            for output in &self.outputs {
                output.buffer.set_fault(fault.clone());
            }
            return Ok(());
        }

        kernels::execute(&self.kind, &self.inputs, &self.outputs)
            .map_err(|error| Fault::new(self.kind.name(), timeline, error.to_string()))?;

        for output in self.outputs.iter().filter(|output| output.covers_buffer()) {
            output.buffer.clear_fault();
        }
        Ok(())
    }

    fn on_fault(&self, fault: &Fault) {
        for output in &self.outputs {
            output.buffer.set_fault(fault.clone());
        }
    }
}
