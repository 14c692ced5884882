//! The IR flattened onto a dense vector of its free parameter components.

use crate::backend::{gather_blocks, stacked_residuals};
use crate::factors::factor_jacobians;
use crate::ir::ProblemIR;
use crate::traits::NllsProblem;
use anyhow::Result;
use nalgebra::{DMatrix, DVector, DVectorView};
use procrustes_core::Real;
use std::collections::HashMap;

pub(crate) struct DenseProblem<'a> {
    ir: &'a ProblemIR,
    base: Vec<DVector<Real>>,
    /// `offsets[block][k]` is the position of component `k` in `x`, if free.
    offsets: Vec<Vec<Option<usize>>>,
    num_free: usize,
}

impl<'a> DenseProblem<'a> {
    pub(crate) fn new(ir: &'a ProblemIR, values: &HashMap<String, DVector<Real>>) -> Result<Self> {
        ir.validate()?;
        let base = gather_blocks(ir, values)?;

        let mut offsets = Vec::with_capacity(ir.params.len());
        let mut num_free = 0;
        for param in &ir.params {
            let block: Vec<Option<usize>> = (0..param.dim)
                .map(|k| {
                    if param.fixed.is_fixed(k) {
                        None
                    } else {
                        num_free += 1;
                        Some(num_free - 1)
                    }
                })
                .collect();
            offsets.push(block);
        }

        Ok(Self {
            ir,
            base,
            offsets,
            num_free,
        })
    }

    /// Free components of the values the problem was built from.
    pub(crate) fn x0(&self) -> DVector<Real> {
        let mut x = DVector::zeros(self.num_free);
        for (block, offsets) in self.base.iter().zip(&self.offsets) {
            for (k, offset) in offsets.iter().enumerate() {
                if let Some(col) = offset {
                    x[*col] = block[k];
                }
            }
        }
        x
    }

    fn blocks_at(&self, x: &DVector<Real>) -> Vec<DVector<Real>> {
        let mut blocks = self.base.clone();
        for (block, offsets) in blocks.iter_mut().zip(&self.offsets) {
            for (k, offset) in offsets.iter().enumerate() {
                if let Some(col) = offset {
                    block[k] = x[*col];
                }
            }
        }
        blocks
    }

    pub(crate) fn param_map(&self, x: &DVector<Real>) -> HashMap<String, DVector<Real>> {
        self.ir
            .params
            .iter()
            .zip(self.blocks_at(x))
            .map(|(param, block)| (param.name.clone(), block))
            .collect()
    }

    /// Gradient `J^T r` of the cost `0.5 * ||r||^2` over the free components.
    pub(crate) fn gradient(&self, x: &DVector<Real>) -> DVector<Real> {
        self.jacobian(x).tr_mul(&self.residuals(x))
    }

    /// Largest absolute gradient component at the values the problem was built from.
    pub(crate) fn gradient_norm_inf(&self) -> Real {
        self.gradient(&self.x0())
            .iter()
            .fold(0.0, |acc: Real, g| acc.max(g.abs()))
    }
}

impl NllsProblem for DenseProblem<'_> {
    fn num_params(&self) -> usize {
        self.num_free
    }

    fn num_residuals(&self) -> usize {
        self.ir.num_residual_rows()
    }

    fn residuals(&self, x: &DVector<Real>) -> DVector<Real> {
        stacked_residuals(self.ir, &self.blocks_at(x))
    }

    fn jacobian(&self, x: &DVector<Real>) -> DMatrix<Real> {
        let blocks = self.blocks_at(x);
        let mut j = DMatrix::zeros(self.num_residuals(), self.num_free);
        let mut row = 0;
        for residual in &self.ir.residuals {
            let views: Vec<DVectorView<'_, Real>> = residual
                .params
                .iter()
                .map(|id| blocks[id.0].as_view())
                .collect();
            let partials = factor_jacobians(&residual.factor, &views);
            for (id, partial) in residual.params.iter().zip(&partials) {
                for (k, offset) in self.offsets[id.0].iter().enumerate() {
                    if let Some(col) = offset {
                        for r in 0..residual.residual_dim {
                            j[(row + r, *col)] += partial[(r, k)];
                        }
                    }
                }
            }
            row += residual.residual_dim;
        }
        j
    }
}
