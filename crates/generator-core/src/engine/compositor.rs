use std::collections::VecDeque;

use rand::Rng;

use crate::block::Compositor;
use crate::engine::unit::{bind, unbind, Chain, Unit};

/// Merges per-child streams into one, moving whole dependency chains.
pub(crate) fn compose<R: Rng + ?Sized>(
    compositor: Compositor,
    sources: Vec<Vec<Unit>>,
    rng: &mut R,
) -> Vec<Unit> {
    if compositor == Compositor::Catenation {
        return sources.into_iter().flatten().collect();
    }
    let mut queues: Vec<VecDeque<Chain>> = sources
        .into_iter()
        .map(|units| bind(units).into())
        .collect();
    let mut merged = Vec::new();
    match compositor {
        Compositor::Catenation => {}
        Compositor::Rotation => {
            while queues.iter().any(|queue| !queue.is_empty()) {
                for queue in &mut queues {
                    merged.extend(queue.pop_front());
                }
            }
        }
        Compositor::Random => loop {
            let remaining: usize = queues.iter().map(VecDeque::len).sum();
            if remaining == 0 {
                break;
            }
            let mut pick = rng.gen_range(0..remaining);
            for queue in &mut queues {
                if pick < queue.len() {
                    merged.extend(queue.pop_front());
                    break;
                }
                pick -= queue.len();
            }
        },
    }
    unbind(merged)
}
