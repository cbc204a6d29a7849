/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Connected components kernel: label-propagation, `Value` is the smallest
//! vertex id seen so far in the component.

use crate::kernel::{Kernel, KernelState, Vertices};
use crate::vertex::Degree;

pub struct ConnectedComponents;

impl Kernel for ConnectedComponents {
    type Value = u64;
    const NEED_ACTIVE_SOURCE_INPUT: bool = true;

    fn init_value(_state: &KernelState, vertex_id: u64) -> u64 {
        vertex_id
    }

    fn pull_gather(
        src_value: u64,
        tgt_acc: &mut u64,
        _src_id: u64,
        _tgt_id: u64,
        _weight: f32,
        _src_degree: &Degree,
        _tgt_degree: &Degree,
        _config: &KernelState,
    ) -> bool {
        if src_value < *tgt_acc {
            *tgt_acc = src_value;
            true
        } else {
            false
        }
    }

    fn gather(leader: &mut u64, follower: u64) -> bool {
        if follower < *leader {
            *leader = follower;
            true
        } else {
            false
        }
    }

    fn reduce(acc: u64, incoming: u64, _vertex_id: u64, _degree: &Degree, _config: &KernelState) -> (u64, bool) {
        if incoming < acc { (incoming, true) } else { (acc, false) }
    }

    fn apply(_vertices: &mut Vertices<'_, u64>, _vertex_id: usize, _config: &KernelState, _iteration: u64) {}

    fn init_vertices(vertices: &mut Vertices<'_, u64>, _config: &KernelState) {
        for (i, slot) in vertices.next.iter_mut().enumerate() {
            *slot = i as u64;
        }
    }

    fn terminate_on_no_active_vertices() -> bool {
        true
    }
}
