/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Concrete kernels and the `--algorithm` tagged-union dispatch (spec §9).

pub mod bfs;
pub mod bp;
pub mod cc;
pub mod pagerank;
pub mod spmv;
pub mod sssp;
pub mod tc;

/// The `--algorithm` flag's value space (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum AlgorithmKind {
    Pagerank,
    Bfs,
    Cc,
    Sssp,
    Spmv,
    Tc,
    Bp,
}

/// Instantiates `$body` (an expression using the generic `$kernel_ty` alias)
/// once per algorithm, monomorphizing the whole call tree over the chosen
/// [`crate::kernel::Kernel`] implementation rather than dispatching
/// virtually inside the per-edge loop (spec §9).
#[macro_export]
macro_rules! dispatch_algorithm {
    ($algorithm:expr, $kernel_ty:ident => $body:expr) => {
        match $algorithm {
            $crate::kernels::AlgorithmKind::Pagerank => {
                type $kernel_ty = $crate::kernels::pagerank::PageRank;
                $body
            }
            $crate::kernels::AlgorithmKind::Bfs => {
                type $kernel_ty = $crate::kernels::bfs::Bfs;
                $body
            }
            $crate::kernels::AlgorithmKind::Cc => {
                type $kernel_ty = $crate::kernels::cc::ConnectedComponents;
                $body
            }
            $crate::kernels::AlgorithmKind::Sssp => {
                type $kernel_ty = $crate::kernels::sssp::Sssp;
                $body
            }
            $crate::kernels::AlgorithmKind::Spmv => {
                type $kernel_ty = $crate::kernels::spmv::Spmv;
                $body
            }
            $crate::kernels::AlgorithmKind::Tc => {
                type $kernel_ty = $crate::kernels::tc::TriangleCount;
                $body
            }
            $crate::kernels::AlgorithmKind::Bp => {
                type $kernel_ty = $crate::kernels::bp::BeliefPropagation;
                $body
            }
        }
    };
}
