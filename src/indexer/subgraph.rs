//! GraphQL client for the options subgraph
//!
//! The subgraph stores BigInt fields as decimal strings and keys users by
//! lowercase hex address. It does not track buyers or settlement flags.

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use super::{IndexerError, OptionSource};
use crate::options::OptionView;

const GET_AVAILABLE_OPTIONS: &str = r#"
query GetAvailableOptions {
  options(where: { isActive: true }, orderBy: createdAt, orderDirection: desc) {
    id
    strike
    expiration
    premium
    isCall
    underlying
    createdAt
    creator { id }
  }
}"#;

const GET_USER_OPTIONS: &str = r#"
query GetUserOptions($userAddress: String!) {
  user(id: $userAddress) {
    optionsCreated(where: { isActive: true }) {
      id
      strike
      expiration
      premium
      isCall
      underlying
      createdAt
    }
  }
}"#;

const GET_OPTIONS_BY_STRIKE: &str = r#"
query GetOptionsByStrike($minStrike: BigInt!, $maxStrike: BigInt!) {
  options(
    where: { strike_gte: $minStrike, strike_lte: $maxStrike, isActive: true }
    orderBy: expiration
    orderDirection: asc
  ) {
    id
    strike
    expiration
    premium
    creator { id }
  }
}"#;

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct EntityRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubgraphOption {
    id: String,
    strike: String,
    expiration: String,
    premium: String,
    #[serde(default)]
    is_call: Option<bool>,
    #[serde(default)]
    underlying: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    creator: Option<EntityRef>,
}

#[derive(Deserialize)]
struct OptionsData {
    options: Vec<SubgraphOption>,
}

#[derive(Deserialize)]
struct UserData {
    user: Option<UserOptions>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserOptions {
    options_created: Vec<SubgraphOption>,
}

fn big_int(field: &str, value: &str) -> Result<U256, IndexerError> {
    U256::from_str_radix(value, 10)
        .map_err(|_| IndexerError::MalformedRecord(format!("{} is not a BigInt: {}", field, value)))
}

fn small_int(field: &str, value: &str) -> Result<u64, IndexerError> {
    value
        .parse::<u64>()
        .map_err(|_| IndexerError::MalformedRecord(format!("{} is not a u64: {}", field, value)))
}

impl SubgraphOption {
    /// `creator` fills in for records queried through a user, which omit it
    fn into_view(self, creator: Option<Address>) -> Result<OptionView, IndexerError> {
        let creator = match (&self.creator, creator) {
            (Some(entity), _) => Address::from_str(&entity.id).map_err(|_| {
                IndexerError::MalformedRecord(format!("creator is not an address: {}", entity.id))
            })?,
            (None, Some(creator)) => creator,
            (None, None) => {
                return Err(IndexerError::MalformedRecord(format!(
                    "option {} has no creator",
                    self.id
                )))
            }
        };

        Ok(OptionView {
            id: small_int("id", &self.id)?,
            // underlying may be a symbol rather than an address
            asset: self
                .underlying
                .as_deref()
                .and_then(|u| Address::from_str(u).ok()),
            amount: None,
            strike: big_int("strike", &self.strike)?,
            premium: big_int("premium", &self.premium)?,
            expiry: small_int("expiration", &self.expiration)?,
            creator,
            buyer: None,
            is_call: self.is_call.unwrap_or(false),
            created_at: self
                .created_at
                .as_deref()
                .map(|c| small_int("createdAt", c))
                .transpose()?,
            asset_delivered: None,
            funds_delivered: None,
        })
    }
}

fn into_views(
    records: Vec<SubgraphOption>,
    creator: Option<Address>,
) -> Result<Vec<OptionView>, IndexerError> {
    records.into_iter().map(|r| r.into_view(creator)).collect()
}

/// Client for the options subgraph
#[derive(Clone)]
pub struct SubgraphClient {
    http: reqwest::Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        name: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, IndexerError> {
        let response: GraphQlResponse<T> = self
            .http
            .post(&self.url)
            .json(&GraphQlRequest { query, variables })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let data = unwrap_response(response)?;
        tracing::debug!(query = name, "Subgraph query succeeded");
        Ok(data)
    }
}

fn unwrap_response<T>(response: GraphQlResponse<T>) -> Result<T, IndexerError> {
    if !response.errors.is_empty() {
        return Err(IndexerError::GraphQl(
            response.errors.into_iter().map(|e| e.message).collect(),
        ));
    }
    response
        .data
        .ok_or_else(|| IndexerError::MalformedRecord("response has no data".into()))
}

#[async_trait]
impl OptionSource for SubgraphClient {
    async fn active_options(&self) -> Result<Vec<OptionView>, IndexerError> {
        let data: OptionsData = self
            .query("GetAvailableOptions", GET_AVAILABLE_OPTIONS, json!({}))
            .await?;
        into_views(data.options, None)
    }

    async fn options_created_by(&self, creator: Address) -> Result<Vec<OptionView>, IndexerError> {
        let user_id = format!("{:#x}", creator);
        let data: UserData = self
            .query(
                "GetUserOptions",
                GET_USER_OPTIONS,
                json!({ "userAddress": user_id }),
            )
            .await?;

        match data.user {
            Some(user) => into_views(user.options_created, Some(creator)),
            None => Ok(Vec::new()),
        }
    }

    async fn options_by_strike(
        &self,
        min: U256,
        max: U256,
    ) -> Result<Vec<OptionView>, IndexerError> {
        let data: OptionsData = self
            .query(
                "GetOptionsByStrike",
                GET_OPTIONS_BY_STRIKE,
                json!({ "minStrike": min.to_string(), "maxStrike": max.to_string() }),
            )
            .await?;
        into_views(data.options, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode<T: DeserializeOwned>(body: Value) -> Result<T, IndexerError> {
        let response: GraphQlResponse<T> = serde_json::from_value(body).unwrap();
        unwrap_response(response)
    }

    #[test]
    fn test_decode_available_options() {
        let data: OptionsData = decode(json!({
            "data": {
                "options": [{
                    "id": "7",
                    "strike": "2000000000",
                    "expiration": "1924905600",
                    "premium": "50000000",
                    "isCall": false,
                    "underlying": "0x4242424242424242424242424242424242424242",
                    "createdAt": "1760000000",
                    "creator": { "id": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a" }
                }]
            }
        }))
        .unwrap();

        let views = into_views(data.options, None).unwrap();
        let view = &views[0];
        assert_eq!(view.id, 7);
        assert_eq!(view.strike, U256::from(2_000_000_000u64));
        assert_eq!(view.expiry, 1_924_905_600);
        assert_eq!(view.creator, Address::repeat_byte(0x0a));
        assert_eq!(view.asset, Some(Address::repeat_byte(0x42)));
        assert_eq!(view.created_at, Some(1_760_000_000));
        assert_eq!(view.amount, None);
        assert_eq!(view.buyer, None);
    }

    #[test]
    fn test_user_options_take_creator_from_query() {
        let data: UserData = decode(json!({
            "data": {
                "user": {
                    "optionsCreated": [{
                        "id": "1",
                        "strike": "1",
                        "expiration": "2",
                        "premium": "3",
                        "underlying": "WETH"
                    }]
                }
            }
        }))
        .unwrap();

        let owner = Address::repeat_byte(0x0b);
        let views = into_views(data.user.unwrap().options_created, Some(owner)).unwrap();
        assert_eq!(views[0].creator, owner);
        assert_eq!(views[0].asset, None);
        assert!(!views[0].is_call);
    }

    #[test]
    fn test_unknown_user_decodes_to_none() {
        let data: UserData = decode(json!({ "data": { "user": null } })).unwrap();
        assert!(data.user.is_none());
    }

    #[test]
    fn test_graphql_errors_surface() {
        let err = decode::<OptionsData>(json!({
            "data": null,
            "errors": [{ "message": "indexing_error" }, { "message": "store error" }]
        }))
        .err()
        .unwrap();

        assert!(matches!(err, IndexerError::GraphQl(ref m) if m.len() == 2));
        assert_eq!(err.to_string(), "graphql errors: indexing_error; store error");
    }

    #[test]
    fn test_malformed_big_int() {
        let data: OptionsData = decode(json!({
            "data": {
                "options": [{
                    "id": "1",
                    "strike": "1e6",
                    "expiration": "2",
                    "premium": "3",
                    "creator": { "id": "0x0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a0a" }
                }]
            }
        }))
        .unwrap();

        assert!(matches!(
            into_views(data.options, None),
            Err(IndexerError::MalformedRecord(_))
        ));
    }
}
