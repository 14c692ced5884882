use anyhow::{ensure, Result};
use std::collections::BTreeSet;

/// Identifier for a parameter block in the IR.
///
/// Stable within a `ProblemIR` instance; residual blocks reference their
/// parameter dependencies through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub usize);

/// Fixed parameter mask for a block.
///
/// Fixed indices keep their initial value for the whole solve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedMask {
    fixed_indices: BTreeSet<usize>,
}

impl FixedMask {
    /// Creates a mask with no fixed indices.
    pub fn all_free() -> Self {
        Self::default()
    }

    /// Creates a mask with all indices fixed.
    pub fn all_fixed(dim: usize) -> Self {
        Self {
            fixed_indices: (0..dim).collect(),
        }
    }

    /// Creates a mask from an explicit list of indices.
    pub fn fix_indices(indices: &[usize]) -> Self {
        Self {
            fixed_indices: indices.iter().copied().collect(),
        }
    }

    pub fn is_fixed(&self, idx: usize) -> bool {
        self.fixed_indices.contains(&idx)
    }

    /// Returns `true` if all indices `[0, dim)` are fixed.
    pub fn is_all_fixed(&self, dim: usize) -> bool {
        (0..dim).all(|idx| self.is_fixed(idx))
    }

    /// Iterates over fixed indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed_indices.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed_indices.is_empty()
    }
}

/// Backend-agnostic factor kinds.
///
/// Each factor kind implies its parameter layout and residual dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Rigidly moved reference point against one observed 2D point.
    ///
    /// Parameters: `[translation (2), rotation angle (1), reference point (2)]`.
    /// Residual: `Rot(angle) * point + translation - observed`.
    RigidPoint2 { observed: [f64; 2] },
}

impl FactorKind {
    /// Residual dimension implied by the factor.
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::RigidPoint2 { .. } => 2,
        }
    }

    /// Expected dimension of each parameter block, in order.
    pub fn param_dims(&self) -> &'static [usize] {
        match self {
            FactorKind::RigidPoint2 { .. } => &[2, 1, 2],
        }
    }
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub fixed: FixedMask,
}

/// Residual block definition in the IR.
///
/// The order of `params` must match the factor's expected parameter order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub factor: FactorKind,
    pub residual_dim: usize,
}

impl ResidualBlock {
    pub fn new(params: Vec<ParamId>, factor: FactorKind) -> Self {
        let residual_dim = factor.residual_dim();
        Self {
            params,
            factor,
            residual_dim,
        }
    }
}

/// Backend-agnostic optimization problem representation.
///
/// Backends compile this IR into solver-specific problems.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        fixed: FixedMask,
    ) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            fixed,
        });
        id
    }

    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    /// Finds a parameter by name.
    pub fn param_by_name(&self, name: &str) -> Option<ParamId> {
        self.params.iter().find(|p| p.name == name).map(|p| p.id)
    }

    /// Total number of scalar residual rows.
    pub fn num_residual_rows(&self) -> usize {
        self.residuals.iter().map(|r| r.residual_dim).sum()
    }

    /// Number of scalar parameters that are not fixed.
    pub fn num_free_params(&self) -> usize {
        self.params
            .iter()
            .map(|p| (0..p.dim).filter(|&idx| !p.fixed.is_fixed(idx)).count())
            .sum()
    }

    /// Validates internal consistency and factor expectations.
    pub fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(param.dim > 0, "param {} has zero dimension", param.name);
            ensure!(
                names.insert(param.name.as_str()),
                "duplicate param name {}",
                param.name
            );
            for fixed_idx in param.fixed.iter() {
                ensure!(
                    fixed_idx < param.dim,
                    "param {} fixed index {} out of range",
                    param.name,
                    fixed_idx
                );
            }
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            ensure!(
                residual.residual_dim == residual.factor.residual_dim(),
                "residual {} dim {} does not match factor expectation {}",
                r_idx,
                residual.residual_dim,
                residual.factor.residual_dim()
            );
            let expected = residual.factor.param_dims();
            ensure!(
                residual.params.len() == expected.len(),
                "residual {} expects {} params, got {}",
                r_idx,
                expected.len(),
                residual.params.len()
            );
            for (param, &dim) in residual.params.iter().zip(expected) {
                ensure!(
                    param.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    param
                );
                let block = &self.params[param.0];
                ensure!(
                    block.dim == dim,
                    "residual {} expects {}D block for {}, got {}D",
                    r_idx,
                    dim,
                    block.name,
                    block.dim
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rigid_point_ir() -> (ProblemIR, [ParamId; 3]) {
        let mut ir = ProblemIR::new();
        let t = ir.add_param_block("translation/0", 2, FixedMask::all_free());
        let r = ir.add_param_block("rotation/0", 1, FixedMask::all_free());
        let p = ir.add_param_block("reference/0", 2, FixedMask::all_free());
        ir.add_residual_block(ResidualBlock::new(
            vec![t, r, p],
            FactorKind::RigidPoint2 {
                observed: [1.0, 2.0],
            },
        ));
        (ir, [t, r, p])
    }

    #[test]
    fn valid_ir_passes() {
        let (ir, [_, r, _]) = rigid_point_ir();
        ir.validate().unwrap();
        assert_eq!(ir.num_residual_rows(), 2);
        assert_eq!(ir.num_free_params(), 5);
        assert_eq!(ir.param_by_name("rotation/0"), Some(r));
        assert_eq!(ir.param_by_name("rotation/1"), None);
    }

    #[test]
    fn param_order_is_checked() {
        let (mut ir, [t, r, p]) = rigid_point_ir();
        ir.residuals[0].params = vec![r, t, p];
        let err = ir.validate().unwrap_err().to_string();
        assert!(err.contains("expects 2D block"), "unexpected error: {err}");
    }

    #[test]
    fn duplicate_names_and_bad_masks_are_rejected() {
        let (mut ir, _) = rigid_point_ir();
        ir.add_param_block("rotation/0", 1, FixedMask::all_free());
        assert!(ir.validate().is_err());

        let (mut ir, _) = rigid_point_ir();
        ir.params[0].fixed = FixedMask::fix_indices(&[2]);
        assert!(ir.validate().is_err());
    }

    #[test]
    fn fixed_mask_counts() {
        let mask = FixedMask::fix_indices(&[1, 0]);
        assert!(mask.is_all_fixed(2));
        assert!(!mask.is_all_fixed(3));
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 1]);
        assert!(FixedMask::all_free().is_empty());
        assert!(FixedMask::all_fixed(3).is_fixed(2));
    }
}
