use sha2::{Digest, Sha256};
use std::fmt::Write;
use uuid::Uuid;

/// 密码最小长度
pub const MIN_PASSWORD_LENGTH: usize = 5;

/// 生成新的随机盐
pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 计算 sha256(salt || password) 的十六进制表示
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // 写入 String 不会失败
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// 校验密码
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let actual = hash_password(password, salt);
    // 逐字节比较，避免提前返回
    actual.len() == expected_hash.len()
        && actual
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_verifiable() {
        let salt = new_salt();
        let hash = hash_password("secret", &salt);
        assert_eq!(hash.len(), 64);
        assert!(verify_password("secret", &salt, &hash));
        assert!(!verify_password("Secret", &salt, &hash));
        assert_ne!(hash, hash_password("secret", &new_salt()));
    }
}
