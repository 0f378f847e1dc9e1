pub mod url_validator;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// 短码最大长度
pub const MAX_CODE_LENGTH: usize = 10;

/// 生成随机短码
///
/// 从线程 CSPRNG 取 8 字节，URL-safe base64 编码后截断到 `length`。
/// 唯一性由存储层的唯一索引保证，这里不做检查。
pub fn generate_code(length: usize) -> String {
    let length = length.clamp(1, MAX_CODE_LENGTH);
    let bytes: [u8; 8] = rand::random();
    let mut code = URL_SAFE_NO_PAD.encode(bytes);
    code.truncate(length);
    code
}

/// 短码格式：1..=10 个字符，仅允许字母、数字、`-` 和 `_`
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LENGTH
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
