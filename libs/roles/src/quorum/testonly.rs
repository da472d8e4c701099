use rand::{
    distributions::{Distribution, Standard},
    Rng,
};

use super::{DkgEvent, DkgPhase};

impl Distribution<DkgPhase> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DkgPhase {
        DkgPhase::ALL[rng.gen_range(0..DkgPhase::ALL.len())]
    }
}

impl Distribution<DkgEvent> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DkgEvent {
        DkgEvent {
            member: rng.gen(),
            phase: rng.gen(),
        }
    }
}
