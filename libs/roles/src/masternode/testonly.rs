use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use super::ProTxHash;

impl Distribution<ProTxHash> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ProTxHash {
        ProTxHash(rng.gen())
    }
}
