use serde_json::Value;

use crate::error::UpstreamError;

/// `header.resultCode` of a successful registry call.
const RESULT_OK: &str = "00";

/// The two data.go.kr endpoint families that carry UDI-DI device data. They
/// differ in the query parameter for the identifier, where the result rows
/// sit in the response, and what the row fields are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamProfile {
    /// `MdeqStdCdUnityInfoService01`, rows under `response.body.items.item`.
    StandardCode,
    /// `MddevPrdtInfoService1`, rows under `body.items`.
    ProductInfo,
}

/// Row field names for one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
    pub identifier: &'static str,
    pub brand: &'static str,
    pub model: &'static str,
    pub product_name: &'static str,
}

impl UpstreamProfile {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard-code" | "standard_code" | "mdeqstdcdunityinfoservice01" => {
                Some(UpstreamProfile::StandardCode)
            }
            "product-info" | "product_info" | "mddevprdtinfoservice1" => {
                Some(UpstreamProfile::ProductInfo)
            }
            _ => None,
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            UpstreamProfile::StandardCode => {
                "https://apis.data.go.kr/1471000/MdeqStdCdUnityInfoService01/getMdeqStdCdUnityInfoList"
            }
            UpstreamProfile::ProductInfo => {
                "https://apis.data.go.kr/1471000/MddevPrdtInfoService1/getMddevPrdtInfoList"
            }
        }
    }

    /// Query parameter the identifier is sent under.
    pub fn identifier_param(self) -> &'static str {
        match self {
            UpstreamProfile::StandardCode => "diCd",
            UpstreamProfile::ProductInfo => "UDI_DI",
        }
    }

    fn items_pointer(self) -> &'static str {
        match self {
            UpstreamProfile::StandardCode => "/response/body/items/item",
            UpstreamProfile::ProductInfo => "/body/items",
        }
    }

    fn result_code_pointer(self) -> &'static str {
        match self {
            UpstreamProfile::StandardCode => "/response/header/resultCode",
            UpstreamProfile::ProductInfo => "/header/resultCode",
        }
    }

    /// The registry reports key and quota problems with HTTP 200 and a
    /// non-`00` result code. A response without a header passes.
    pub fn check_result(self, response: &Value) -> Result<(), UpstreamError> {
        let code = match response.pointer(self.result_code_pointer()) {
            Some(Value::String(code)) => code.trim().to_string(),
            Some(Value::Number(code)) => format!("{:0>2}", code.to_string()),
            _ => return Ok(()),
        };
        if code == RESULT_OK {
            Ok(())
        } else {
            Err(UpstreamError::Rejected { code })
        }
    }

    pub fn fields(self) -> FieldMap {
        match self {
            UpstreamProfile::StandardCode => FieldMap {
                identifier: "diCd",
                brand: "bsshNm",
                model: "mdlNm",
                product_name: "prdlstNm",
            },
            UpstreamProfile::ProductInfo => FieldMap {
                identifier: "UDI_DI",
                brand: "ENTP_NAME",
                model: "PRDL_NM",
                product_name: "PRDT_NM",
            },
        }
    }

    /// First result row, if the response has any.
    ///
    /// data.go.kr collapses a one-row list into a bare object and an empty
    /// list into `""`, so both shapes are accepted.
    pub fn first_item(self, response: &Value) -> Option<&Value> {
        match response.pointer(self.items_pointer())? {
            Value::Array(items) => items.first().filter(|item| item.is_object()),
            item @ Value::Object(_) => Some(item),
            _ => None,
        }
    }
}
