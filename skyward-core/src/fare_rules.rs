use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareRule {
    pub airline: Option<String>,
    pub city_pair: Option<String>,
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaggageAllowance {
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub flight_number: Option<String>,
    pub checked: Option<String>,
    pub cabin: Option<String>,
}

/// What the acceptance modal renders. Both lists may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareRulesView {
    pub rules: Vec<FareRule>,
    pub baggage: Vec<BaggageAllowance>,
}

impl FareRulesView {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.baggage.is_empty()
    }

    /// Reads the nested backend structure, tolerating any missing layer.
    ///
    /// Accepts the body either wrapped in
    /// `FareRules1_1Response.FareRule1_1Result` or already unwrapped.
    pub fn from_backend(body: &Value) -> Self {
        let result = body
            .pointer("/FareRules1_1Response/FareRule1_1Result")
            .unwrap_or(body);

        let rules = array(result, "FareRules")
            .iter()
            .filter_map(|entry| entry.get("FareRule"))
            .flat_map(|rule| {
                let airline = text(rule, "Airline");
                let city_pair = text(rule, "CityPair");
                array(rule, "RuleDetails")
                    .iter()
                    .map(move |detail| FareRule {
                        airline: airline.clone(),
                        city_pair: city_pair.clone(),
                        category: text(detail, "Category").unwrap_or_default(),
                        text: text(detail, "Rules").unwrap_or_default(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let baggage = array(result, "BaggageInfos")
            .iter()
            .filter_map(|entry| entry.get("BaggageInfo"))
            .map(|info| BaggageAllowance {
                departure: text(info, "Departure"),
                arrival: text(info, "Arrival"),
                flight_number: text(info, "FlightNo"),
                checked: text(info, "Baggage"),
                cabin: text(info, "CabinBaggage"),
            })
            .collect();

        Self { rules, baggage }
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
