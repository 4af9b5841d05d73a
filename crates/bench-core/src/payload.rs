use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

/// One synthetic record, shaped like a user-signup payload.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub email: String,
    pub name: String,
    pub uuid: String,
}

/// Seeded record generator: the same seed reproduces a run's payloads
/// exactly. No I/O; the owned RNG is the only state.
pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate_record(&mut self) -> Record {
        let email: String = SafeEmail().fake_with_rng(&mut self.rng);
        let name: String = Name().fake_with_rng(&mut self.rng);
        // Built from RNG bytes rather than Uuid::new_v4 so the seed
        // fully determines the payload.
        let bytes: [u8; 16] = self.rng.gen();
        let uuid = uuid::Builder::from_random_bytes(bytes)
            .into_uuid()
            .to_string();
        Record { email, name, uuid }
    }

    pub fn build_batch(&mut self, size: u32) -> Vec<Record> {
        (0..size).map(|_| self.generate_record()).collect()
    }
}
