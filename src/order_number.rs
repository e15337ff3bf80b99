//! Human-readable order numbers.

use chrono::Utc;
use rand::Rng;

const SUFFIX_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 6;

/// Builds an order number like `ORD-250806-7K2Q9X`: the current UTC date
/// plus a random base-36 suffix. Collisions across the store's order volume
/// are practically impossible; the UNIQUE constraint on
/// `ordenes.numero_orden` backs the remaining chance.
pub fn generate_order_number() -> String {
    let fecha = Utc::now().format("%y%m%d");
    let mut rng = rand::thread_rng();
    let sufijo: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("ORD-{fecha}-{sufijo}")
}
