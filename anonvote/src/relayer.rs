use crate::*;
use async_trait::async_trait;
use ethers::types::Address;
use std::time::Duration;

/// Upper bound on any single relayer request
pub const RELAYER_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize, Debug, Clone)]
struct KeyUrlResp {
    #[serde(default)]
    response: Option<serde_json::Value>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct InputValue {
    #[serde(rename = "type")]
    kind: &'static str,
    value: u32,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct InputProofReq {
    contract_address: String,
    user_address: String,
    values: Vec<InputValue>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct InputProofResp {
    handles: Vec<String>,
    input_proof: String,
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, Error> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value)
        .map_err(|e| Error::EncryptionFailure(format!("invalid {} from relayer: {}", field, e)))
}

/// Turn a relayer `input-proof` response body into an encrypted vote
fn decode_input_proof(body: &str) -> Result<EncryptedVote, Error> {
    let resp: InputProofResp = serde_json::from_str(body)
        .map_err(|e| Error::EncryptionFailure(format!("malformed relayer response: {}", e)))?;

    let first = resp
        .handles
        .first()
        .ok_or_else(|| Error::EncryptionFailure("relayer returned no handles".into()))?;
    let bytes = decode_hex("handle", first)?;
    if bytes.len() != 32 {
        return Err(Error::EncryptionFailure(format!(
            "relayer handle is {} bytes, expected 32",
            bytes.len()
        )));
    }
    let mut handle = [0u8; 32];
    handle.copy_from_slice(&bytes);

    let proof = decode_hex("input proof", &resp.input_proof)?;
    if proof.is_empty() {
        return Err(Error::EncryptionFailure("relayer returned an empty proof".into()));
    }

    Ok(EncryptedVote {
        handle,
        proof,
        simulated: false,
    })
}

/// Encrypts votes through a relayer HTTP service
pub struct RelayerEncryptor {
    client: reqwest::Client,
    base_uri: String,
}

impl RelayerEncryptor {
    /// Contact the relayer and fetch the network's public key material.
    /// Fails if the relayer is unreachable or does not serve this network.
    pub async fn init(network: &EncryptionNetwork) -> Result<Self, Error> {
        let base_uri = network.relayer_url.trim_end_matches('/').to_owned();
        let client = reqwest::Client::builder()
            .timeout(RELAYER_TIMEOUT)
            .build()
            .map_err(|e| Error::EncryptionFailure(format!("cannot build relayer client: {}", e)))?;

        let full_uri = format!(
            "{}/v1/keyurl?chainId={}&kms={:?}&acl={:?}",
            base_uri, network.chain_id, network.kms_address, network.acl_address
        );
        debug!("fetching encryption key material from {}", full_uri);

        let res = client
            .get(&full_uri)
            .send()
            .await
            .map_err(|e| Error::EncryptionFailure(format!("relayer unreachable: {}", e)))?;
        if !res.status().is_success() {
            return Err(Error::EncryptionFailure(format!(
                "relayer rejected initialization: {}",
                res.status()
            )));
        }
        let keys: KeyUrlResp = res
            .json()
            .await
            .map_err(|e| Error::EncryptionFailure(format!("malformed relayer response: {}", e)))?;
        if keys.response.is_none() {
            warn!("relayer returned no key material, continuing anyway");
        }

        Ok(RelayerEncryptor { client, base_uri })
    }
}

#[async_trait]
impl VoteEncryptor for RelayerEncryptor {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<EncryptedVote, Error> {
        let full_uri = format!("{}/v1/input-proof", self.base_uri);
        let req = InputProofReq {
            contract_address: format!("{:?}", contract),
            user_address: format!("{:?}", user),
            values: vec![InputValue {
                kind: "euint32",
                value,
            }],
        };

        let res = self
            .client
            .post(&full_uri)
            .json(&req)
            .send()
            .await
            .map_err(|e| Error::EncryptionFailure(format!("relayer unreachable: {}", e)))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| Error::EncryptionFailure(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::EncryptionFailure(format!(
                "relayer returned {}: {}",
                status, body
            )));
        }

        decode_input_proof(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_input_proof() {
        let body = format!(
            r#"{{"handles":["0x{}"],"inputProof":"0x{}"}}"#,
            "ab".repeat(32),
            "cd".repeat(100)
        );
        let vote = decode_input_proof(&body).unwrap();
        assert_eq!(vote.handle, [0xab; 32]);
        assert_eq!(vote.proof.len(), 100);
        assert!(!vote.simulated);
    }

    #[test]
    fn rejects_bad_responses() {
        let no_handles = r#"{"handles":[],"inputProof":"0x00"}"#;
        assert!(matches!(
            decode_input_proof(no_handles),
            Err(Error::EncryptionFailure(_))
        ));

        let short = r#"{"handles":["0xabcd"],"inputProof":"0x00"}"#;
        assert!(decode_input_proof(short).is_err());

        let body = format!(r#"{{"handles":["{}"],"inputProof":""}}"#, "ab".repeat(32));
        assert!(decode_input_proof(&body).is_err());

        assert!(decode_input_proof("not json").is_err());
    }

    #[test]
    fn request_shape() {
        let req = InputProofReq {
            contract_address: "0x01".into(),
            user_address: "0x02".into(),
            values: vec![InputValue {
                kind: "euint32",
                value: 1,
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["contractAddress"], "0x01");
        assert_eq!(json["values"][0]["type"], "euint32");
        assert_eq!(json["values"][0]["value"], 1);
    }
}
