use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// One partition-index bit of the simulated hash.
///
/// Either a single physical address bit or an XOR of several, matching the
/// shape DRAM addressing functions are published in.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum BitDef {
    /// The partition bit mirrors a single address bit.
    Single(u32),
    /// The partition bit XORs several address bits.
    Multi(Vec<u32>),
}

impl BitDef {
    /// Converts the definition to a participation mask.
    ///
    /// # Errors
    ///
    /// Rejects bit indices that do not fit in a 64-bit address.
    pub fn to_mask(&self) -> Result<u64, Error> {
        let bits: &[u32] = match self {
            BitDef::Single(bit) => std::slice::from_ref(bit),
            BitDef::Multi(bits) => bits,
        };
        let mut mask = 0u64;
        for &bit in bits {
            if bit >= u64::BITS {
                return Err(Error::BitOutOfRange(bit));
            }
            mask |= 1 << bit;
        }
        Ok(mask)
    }
}

/// Errors loading or validating a ground-truth hash model.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON of the expected shape.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// A bit index does not fit in a 64-bit physical address.
    #[error("partition bit {0} is outside the supported physical address width")]
    BitOutOfRange(u32),
}

/// The known hash of the simulated memory controller.
///
/// One [`BitDef`] per partition-index bit, most significant first.
#[derive(Clone, Debug, Deserialize)]
pub struct GroundTruth {
    /// The XOR function producing each bit of the partition index.
    pub partition_bits: Vec<BitDef>,
}

impl GroundTruth {
    /// Loads a ground-truth model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_jsonfile(path: impl AsRef<Path>) -> Result<GroundTruth, Error> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// The participation masks of all partition-bit functions.
    ///
    /// # Errors
    ///
    /// Rejects bit indices that do not fit in a 64-bit address.
    pub fn masks(&self) -> Result<Vec<u64>, Error> {
        self.partition_bits.iter().map(BitDef::to_mask).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::GroundTruth;

    #[test]
    fn parses_single_and_multi_bit_functions() {
        let truth: GroundTruth =
            serde_json::from_str(r#"{ "partition_bits": [13, [14, 18], [15, 19]] }"#).unwrap();
        assert_eq!(
            truth.masks().unwrap(),
            vec![1 << 13, (1 << 14) | (1 << 18), (1 << 15) | (1 << 19)]
        );
    }

    #[test]
    fn rejects_bits_beyond_the_address_width() {
        let truth: GroundTruth =
            serde_json::from_str(r#"{ "partition_bits": [[14, 64]] }"#).unwrap();
        assert!(matches!(
            truth.masks(),
            Err(super::Error::BitOutOfRange(64))
        ));
    }

    #[test]
    fn loads_the_sample_config() {
        let truth = GroundTruth::from_jsonfile("config/ddr4-banks.json")
            .expect("failed to read sample config");
        assert_eq!(truth.masks().unwrap().len(), 4);
    }
}
