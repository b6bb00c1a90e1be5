//! Hashing - SHA-256 Digests for Exports
//!
//! Every export carries a digest of its bytes and a job hash of the inputs
//! that produced it, so identical forms can be recognized.

use sha2::{Digest, Sha256};

use crate::validation::FormRecord;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256::digest(data))
}

/// job_hash = sha256(template_id:template_version:engine_version:form_json)
///
/// `FormRecord` serializes from a sorted map, so the order fields were filled
/// in never changes the hash.
pub fn compute_job_hash(
    template_id: &str,
    template_version: &str,
    form: &FormRecord,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let answers = serde_json::to_vec(form)?;

    let mut hasher = Sha256::new();
    for part in [template_id, template_version, engine_version] {
        hasher.update(part.as_bytes());
        hasher.update(b":");
    }
    hasher.update(&answers);
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        out.push(HEX_DIGITS[(byte & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn birthday_form() -> FormRecord {
        FormRecord::with_fields(["guestName", "birthdayPerson", "age"])
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_job_hash_ignores_fill_order() {
        let mut first = birthday_form();
        first.set("guestName", "Anita");
        first.set("age", "30");

        let mut second = birthday_form();
        second.set("age", "30");
        second.set("guestName", "Anita");

        assert_eq!(
            compute_job_hash("birthday", "1.0.0", &first, "1.0.0").unwrap(),
            compute_job_hash("birthday", "1.0.0", &second, "1.0.0").unwrap()
        );
    }

    #[test]
    fn test_job_hash_tracks_answers_and_versions() {
        let mut form = birthday_form();
        form.set("guestName", "Anita");
        let base = compute_job_hash("birthday", "1.0.0", &form, "1.0.0").unwrap();
        assert_eq!(base.len(), 64);

        assert_ne!(base, compute_job_hash("birthday", "1.1.0", &form, "1.0.0").unwrap());
        assert_ne!(base, compute_job_hash("birthday", "1.0.0", &form, "1.1.0").unwrap());

        form.set("age", "30");
        assert_ne!(base, compute_job_hash("birthday", "1.0.0", &form, "1.0.0").unwrap());
    }
}
