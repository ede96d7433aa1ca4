//! Typed transaction events delivered by the full node.
//!
//! Events arrive as JSON. Inputs and outputs carry the ledger's encoded
//! token-data byte; it is decoded once here into [`OutputValue`], so nothing
//! downstream has to know that the same numeric field means "amount" for one
//! output and "authority bitmask" for another.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::authority::{Authorities, TOKEN_AUTHORITY_MASK};
use crate::{Address, Height, Timestamp, TokenId, TxId, TypesError};

/// Transaction version byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TxVersion {
    Block = 0,
    Regular = 1,
    TokenCreation = 2,
    MergedMiningBlock = 3,
}

impl TxVersion {
    /// Blocks carry a height and their outputs are height-locked rewards.
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block | Self::MergedMiningBlock)
    }
}

impl TryFrom<u8> for TxVersion {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Block),
            1 => Ok(Self::Regular),
            2 => Ok(Self::TokenCreation),
            3 => Ok(Self::MergedMiningBlock),
            other => Err(TypesError::InvalidVersion(other)),
        }
    }
}

impl From<TxVersion> for u8 {
    fn from(v: TxVersion) -> Self {
        v as u8
    }
}

/// What an output (or the output an input spends) carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputValue {
    /// A plain token quantity.
    Amount(u64),
    /// Mint/melt permission; carries no quantity.
    Authority(Authorities),
}

impl OutputValue {
    /// Decode a `(value, token_data)` pair as encoded on the ledger.
    ///
    /// Amounts above `i64::MAX` are rejected: balances are signed.
    pub fn decode(value: u64, token_data: u8) -> Result<Self, TypesError> {
        if token_data & TOKEN_AUTHORITY_MASK == 0 {
            if i64::try_from(value).is_err() {
                return Err(TypesError::InvalidAmount(value));
            }
            return Ok(Self::Amount(value));
        }
        u8::try_from(value)
            .ok()
            .and_then(Authorities::from_bits)
            .map(Self::Authority)
            .ok_or(TypesError::InvalidAuthorities(value))
    }

    /// Encode back into `(value, authority flag)`.
    pub fn encode(&self) -> (u64, bool) {
        match self {
            Self::Amount(v) => (*v, false),
            Self::Authority(a) => (a.bits() as u64, true),
        }
    }

    pub fn is_authority(&self) -> bool {
        matches!(self, Self::Authority(_))
    }

    /// The amount as a signed balance component; zero for authorities.
    pub fn signed_amount(&self) -> Result<i64, TypesError> {
        match self {
            Self::Amount(v) => i64::try_from(*v).map_err(|_| TypesError::InvalidAmount(*v)),
            Self::Authority(_) => Ok(0),
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Self::Amount(v) => *v,
            Self::Authority(_) => 0,
        }
    }

    pub fn authorities(&self) -> Authorities {
        match self {
            Self::Amount(_) => Authorities::NONE,
            Self::Authority(a) => *a,
        }
    }
}

/// Wire form of [`TxInput`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawInput {
    pub tx_id: TxId,
    pub index: u32,
    pub value: u64,
    pub token_id: TokenId,
    pub token_data: u8,
    pub address: Address,
    #[serde(default)]
    pub timelock: Option<Timestamp>,
}

/// Wire form of [`TxOutput`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawOutput {
    pub value: u64,
    pub token_id: TokenId,
    pub token_data: u8,
    pub address: Address,
    #[serde(default)]
    pub timelock: Option<Timestamp>,
}

/// An input: a reference to the output it spends plus that output's decoded data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInput", into = "RawInput")]
pub struct TxInput {
    pub tx_id: TxId,
    pub index: u32,
    pub value: OutputValue,
    pub token_id: TokenId,
    pub address: Address,
    pub timelock: Option<Timestamp>,
}

impl TryFrom<RawInput> for TxInput {
    type Error = TypesError;

    fn try_from(raw: RawInput) -> Result<Self, Self::Error> {
        Ok(Self {
            value: OutputValue::decode(raw.value, raw.token_data)?,
            tx_id: raw.tx_id,
            index: raw.index,
            token_id: raw.token_id,
            address: raw.address,
            timelock: raw.timelock,
        })
    }
}

impl From<TxInput> for RawInput {
    fn from(input: TxInput) -> Self {
        let (value, authority) = input.value.encode();
        Self {
            tx_id: input.tx_id,
            index: input.index,
            value,
            token_id: input.token_id,
            token_data: if authority { TOKEN_AUTHORITY_MASK } else { 0 },
            address: input.address,
            timelock: input.timelock,
        }
    }
}

/// An output created by the transaction. Its index is its position in the list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOutput", into = "RawOutput")]
pub struct TxOutput {
    pub value: OutputValue,
    pub token_id: TokenId,
    pub address: Address,
    pub timelock: Option<Timestamp>,
}

impl TryFrom<RawOutput> for TxOutput {
    type Error = TypesError;

    fn try_from(raw: RawOutput) -> Result<Self, Self::Error> {
        Ok(Self {
            value: OutputValue::decode(raw.value, raw.token_data)?,
            token_id: raw.token_id,
            address: raw.address,
            timelock: raw.timelock,
        })
    }
}

impl From<TxOutput> for RawOutput {
    fn from(output: TxOutput) -> Self {
        let (value, authority) = output.value.encode();
        Self {
            value,
            token_id: output.token_id,
            token_data: if authority { TOKEN_AUTHORITY_MASK } else { 0 },
            address: output.address,
            timelock: output.timelock,
        }
    }
}

/// A transaction or block as delivered to the ingestion pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEvent {
    pub tx_id: TxId,
    pub timestamp: Timestamp,
    pub version: TxVersion,
    #[serde(default)]
    pub height: Option<Height>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
}

impl TxEvent {
    /// Parse and validate one JSON event.
    pub fn from_json(s: &str) -> Result<Self, TypesError> {
        let event: Self = serde_json::from_str(s)?;
        event.validate()?;
        Ok(event)
    }

    /// Structural checks that do not need storage.
    pub fn validate(&self) -> Result<(), TypesError> {
        if self.version.is_block() && self.height.is_none() {
            return Err(TypesError::MalformedEvent(format!(
                "block {} has no height",
                self.tx_id
            )));
        }
        if self.version.is_block() && !self.inputs.is_empty() {
            return Err(TypesError::MalformedEvent(format!(
                "block {} spends inputs",
                self.tx_id
            )));
        }
        if self.outputs.len() > u8::MAX as usize + 1 {
            return Err(TypesError::MalformedEvent(format!(
                "tx {} has {} outputs",
                self.tx_id,
                self.outputs.len()
            )));
        }
        let native_authority = self
            .outputs
            .iter()
            .map(|o| (&o.token_id, o.value))
            .chain(self.inputs.iter().map(|i| (&i.token_id, i.value)))
            .any(|(token, value)| token.is_native() && value.is_authority());
        if native_authority {
            return Err(TypesError::MalformedEvent(format!(
                "tx {} carries an authority on the native token",
                self.tx_id
            )));
        }
        let tokens = self
            .outputs
            .iter()
            .map(|o| &o.token_id)
            .chain(self.inputs.iter().map(|i| &i.token_id));
        for token in tokens {
            if !token.is_well_formed() {
                return Err(TypesError::InvalidTokenId(token.as_str().to_string()));
            }
        }
        for value in self
            .outputs
            .iter()
            .map(|o| o.value)
            .chain(self.inputs.iter().map(|i| i.value))
        {
            value.signed_amount()?;
        }
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert((input.tx_id, input.index)) {
                return Err(TypesError::MalformedEvent(format!(
                    "tx {} spends {}:{} twice",
                    self.tx_id, input.tx_id, input.index
                )));
            }
        }
        Ok(())
    }

    /// Output index as stored on UTXOs.
    pub fn output_index(position: usize) -> u32 {
        position as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_json(version: u8, extra: &str) -> String {
        format!(
            r#"{{"tx_id":"{}","timestamp":100,"version":{version}{extra}}}"#,
            "aa".repeat(32)
        )
    }

    #[test]
    fn decodes_authority_outputs() {
        assert_eq!(OutputValue::decode(500, 0).unwrap(), OutputValue::Amount(500));
        assert_eq!(
            OutputValue::decode(0b11, 0x81).unwrap(),
            OutputValue::Authority(Authorities::ALL)
        );
        assert!(OutputValue::decode(0b100, 0x81).is_err());
    }

    #[test]
    fn parses_regular_transaction() {
        let json = event_json(
            1,
            &format!(
                r#","inputs":[{{"tx_id":"{}","index":0,"value":10,"token_id":"00","token_data":0,"address":"A1"}}],
                "outputs":[{{"value":1,"token_id":"{}","token_data":129,"address":"A2","timelock":200}}]"#,
                "bb".repeat(32),
                "cc".repeat(32)
            ),
        );
        let event = TxEvent::from_json(&json).unwrap();
        assert_eq!(event.version, TxVersion::Regular);
        assert_eq!(event.inputs[0].value, OutputValue::Amount(10));
        assert_eq!(event.outputs[0].value, OutputValue::Authority(Authorities::MINT));
        assert_eq!(event.outputs[0].timelock, Some(Timestamp::new(200)));
    }

    #[test]
    fn rejects_amount_above_signed_range() {
        assert!(OutputValue::decode(i64::MAX as u64, 0).is_ok());
        assert!(matches!(
            OutputValue::decode(i64::MAX as u64 + 1, 0),
            Err(TypesError::InvalidAmount(_))
        ));
        let json = event_json(
            1,
            &format!(
                r#","outputs":[{{"value":{},"token_id":"00","token_data":0,"address":"A"}}]"#,
                u64::MAX
            ),
        );
        assert!(matches!(
            TxEvent::from_json(&json),
            Err(TypesError::Json(_))
        ));
    }

    #[test]
    fn validate_catches_directly_built_oversized_amount() {
        let event = TxEvent {
            tx_id: TxId::new([0xaa; 32]),
            timestamp: Timestamp::new(1),
            version: TxVersion::Regular,
            height: None,
            token_name: None,
            token_symbol: None,
            inputs: vec![],
            outputs: vec![TxOutput {
                value: OutputValue::Amount(u64::MAX),
                token_id: TokenId::native(),
                address: Address::new("A"),
                timelock: None,
            }],
        };
        assert!(matches!(event.validate(), Err(TypesError::InvalidAmount(_))));
    }

    #[test]
    fn rejects_malformed_token_ids() {
        for bad in ["01".to_string(), "zz".repeat(32), "AA".repeat(32), r"a\u0000".to_string()] {
            let json = event_json(
                1,
                &format!(r#","outputs":[{{"value":1,"token_id":"{bad}","token_data":0,"address":"A"}}]"#),
            );
            assert!(
                matches!(TxEvent::from_json(&json), Err(TypesError::InvalidTokenId(_))),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn rejects_block_without_height() {
        let err = TxEvent::from_json(&event_json(0, "")).unwrap_err();
        assert!(matches!(err, TypesError::MalformedEvent(_)));
    }

    #[test]
    fn rejects_unknown_version() {
        assert!(TxEvent::from_json(&event_json(9, "")).is_err());
    }

    #[test]
    fn rejects_native_authority() {
        let json = event_json(
            1,
            r#","outputs":[{"value":1,"token_id":"00","token_data":128,"address":"A"}]"#,
        );
        assert!(matches!(
            TxEvent::from_json(&json),
            Err(TypesError::MalformedEvent(_))
        ));
    }

    #[test]
    fn output_round_trips_token_data() {
        let out = TxOutput {
            value: OutputValue::Authority(Authorities::MELT),
            token_id: TokenId::new("01"),
            address: Address::new("A"),
            timelock: None,
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["token_data"], 128);
        assert_eq!(json["value"], 2);
    }
}
