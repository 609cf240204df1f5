use rand::seq::SliceRandom;
use rand::Rng;

use crate::block::{Obfuscator, Permutator, Pin, Rearranger};
use crate::engine::unit::{bind, unbind, Unit};

pub(crate) fn permute<R: Rng + ?Sized>(permutator: Permutator, units: Vec<Unit>, rng: &mut R) -> Vec<Unit> {
    match permutator {
        Permutator::Trivial => units,
        Permutator::Random => {
            let mut chains = bind(units);
            chains.shuffle(rng);
            unbind(chains)
        }
    }
}

pub(crate) fn rearrange(rearranger: Rearranger, units: Vec<Unit>) -> Vec<Unit> {
    match rearranger {
        Rearranger::Trivial => units,
        Rearranger::Pinned => {
            let (mut head, mut middle, mut tail) = (Vec::new(), Vec::new(), Vec::new());
            for chain in bind(units) {
                match chain.pin() {
                    Some(Pin::Head) => head.push(chain),
                    Some(Pin::Tail) => tail.push(chain),
                    None => middle.push(chain),
                }
            }
            head.append(&mut middle);
            head.append(&mut tail);
            unbind(head)
        }
    }
}

/// One left-to-right pass of random adjacent swaps; pinned chains stay put.
pub(crate) fn obfuscate<R: Rng + ?Sized>(obfuscator: Obfuscator, units: Vec<Unit>, rng: &mut R) -> Vec<Unit> {
    match obfuscator {
        Obfuscator::Random => {
            let mut chains = bind(units);
            let mut index = 0;
            while index + 1 < chains.len() {
                let movable = chains[index].pin().is_none() && chains[index + 1].pin().is_none();
                if movable && rng.gen_bool(0.5) {
                    chains.swap(index, index + 1);
                    index += 2;
                } else {
                    index += 1;
                }
            }
            unbind(chains)
        }
    }
}
