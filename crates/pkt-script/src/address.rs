//! Payment addresses extracted from standard output scripts.

use crate::builder::ScriptBuilder;
use crate::error::Error;
use crate::opcode::{OP_0, OP_CHECKSIG, OP_DUP, OP_EQUAL, OP_EQUALVERIFY, OP_HASH160};
use bitcoin::bech32::{Hrp, segwit};
use bitcoin::hashes::{Hash, hash160};
use bitcoin::secp256k1::PublicKey;

/// Network parameters an address is encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressParams {
    pub pubkey_hash_addr_id: u8,
    pub script_hash_addr_id: u8,
    /// Human readable part of segwit addresses.
    pub bech32_hrp: &'static str,
}

impl AddressParams {
    pub const PKT_MAINNET: Self = Self {
        pubkey_hash_addr_id: 0x75,
        script_hash_addr_id: 0x38,
        bech32_hrp: "pkt",
    };

    pub const BITCOIN_MAINNET: Self = Self {
        pubkey_hash_addr_id: 0x00,
        script_hash_addr_id: 0x05,
        bech32_hrp: "bc",
    };
}

/// Destination of a standard output script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Serialized public key, compressed or uncompressed.
    PubKey(Vec<u8>),
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    WitnessPubKeyHash([u8; 20]),
    WitnessScriptHash([u8; 32]),
}

impl Address {
    /// Encodes the address for the given network.
    ///
    /// Public keys encode as the pay-to-pubkey-hash address of their hash.
    pub fn encode(&self, params: &AddressParams) -> Result<String, Error> {
        match self {
            Self::PubKey(pubkey) => {
                let hash = hash160::Hash::hash(pubkey).to_byte_array();
                Ok(base58_address(params.pubkey_hash_addr_id, &hash))
            }
            Self::PubKeyHash(hash) => Ok(base58_address(params.pubkey_hash_addr_id, hash)),
            Self::ScriptHash(hash) => Ok(base58_address(params.script_hash_addr_id, hash)),
            Self::WitnessPubKeyHash(program) => segwit_address(params.bech32_hrp, program),
            Self::WitnessScriptHash(program) => segwit_address(params.bech32_hrp, program),
        }
    }
}

fn base58_address(version: u8, hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    bitcoin::base58::encode_check(&payload)
}

fn segwit_address(hrp: &'static str, program: &[u8]) -> Result<String, Error> {
    let hrp = Hrp::parse(hrp).map_err(|_| Error::UnsupportedAddress("invalid bech32 prefix"))?;
    segwit::encode(hrp, segwit::VERSION_0, program)
        .map_err(|_| Error::UnsupportedAddress("invalid witness program"))
}

/// Returns the standard output script paying to `address`.
pub fn pay_to_addr_script(address: &Address) -> Result<Vec<u8>, Error> {
    match address {
        Address::PubKey(pubkey) => {
            if PublicKey::from_slice(pubkey).is_err() {
                return Err(Error::UnsupportedAddress("malformed public key"));
            }
            ScriptBuilder::new()
                .add_data(pubkey)
                .add_op(OP_CHECKSIG)
                .script()
        }
        Address::PubKeyHash(hash) => ScriptBuilder::new()
            .add_ops(&[OP_DUP, OP_HASH160])
            .add_data(hash)
            .add_ops(&[OP_EQUALVERIFY, OP_CHECKSIG])
            .script(),
        Address::ScriptHash(hash) => ScriptBuilder::new()
            .add_op(OP_HASH160)
            .add_data(hash)
            .add_op(OP_EQUAL)
            .script(),
        Address::WitnessPubKeyHash(program) => {
            ScriptBuilder::new().add_op(OP_0).add_data(program).script()
        }
        Address::WitnessScriptHash(program) => {
            ScriptBuilder::new().add_op(OP_0).add_data(program).script()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{is_pay_to_pubkey_hash, is_pay_to_script_hash, is_witness_pubkey_hash, is_witness_script_hash};

    fn h20(s: &str) -> [u8; 20] {
        hex::decode(s).unwrap().try_into().unwrap()
    }

    #[test]
    fn test_encode() {
        let genesis = Address::PubKeyHash(h20("62e907b15cbf27d5425399ebf6f0fb50ebb88f18"));
        assert_eq!(
            genesis.encode(&AddressParams::BITCOIN_MAINNET).unwrap(),
            "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
        );

        let p2wpkh = Address::WitnessPubKeyHash(h20("751e76e8199196d454941c45d1b3a323f1433bd6"));
        assert_eq!(
            p2wpkh.encode(&AddressParams::BITCOIN_MAINNET).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );

        let pkt = p2wpkh.encode(&AddressParams::PKT_MAINNET).unwrap();
        assert!(pkt.starts_with("pkt1q"), "{pkt}");
    }

    #[test]
    fn test_pubkey_encodes_as_its_hash() {
        let pubkey = hex::decode(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        let hash = hash160::Hash::hash(&pubkey).to_byte_array();

        let params = AddressParams::PKT_MAINNET;
        assert_eq!(
            Address::PubKey(pubkey).encode(&params).unwrap(),
            Address::PubKeyHash(hash).encode(&params).unwrap()
        );
    }

    #[test]
    fn test_pay_to_addr_script() {
        let hash = [0x42; 20];
        assert!(is_pay_to_pubkey_hash(&pay_to_addr_script(&Address::PubKeyHash(hash)).unwrap()));
        assert!(is_pay_to_script_hash(&pay_to_addr_script(&Address::ScriptHash(hash)).unwrap()));
        assert!(is_witness_pubkey_hash(
            &pay_to_addr_script(&Address::WitnessPubKeyHash(hash)).unwrap()
        ));
        assert!(is_witness_script_hash(
            &pay_to_addr_script(&Address::WitnessScriptHash([0x42; 32])).unwrap()
        ));

        let pubkey = hex::decode(
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
        )
        .unwrap();
        let script = pay_to_addr_script(&Address::PubKey(pubkey.clone())).unwrap();
        assert_eq!(script.len(), 35);
        assert_eq!(&script[1..34], &pubkey[..]);
        assert_eq!(script[34], OP_CHECKSIG);

        assert_eq!(
            pay_to_addr_script(&Address::PubKey(vec![0x05; 33])),
            Err(Error::UnsupportedAddress("malformed public key"))
        );
    }
}
