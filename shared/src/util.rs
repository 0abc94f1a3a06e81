use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an opaque order id: `ORD` + base36(epoch ms) + 6 random base36 chars.
///
/// Not coordinated across processes; the primary key on `orders.order_id`
/// catches the rare collision and the caller retries with a fresh id.
pub fn generate_order_id() -> String {
    order_id_at(now_millis(), &mut rand::thread_rng())
}

fn order_id_at(millis: i64, rng: &mut impl Rng) -> String {
    let mut id = String::with_capacity(20);
    id.push_str("ORD");
    id.push_str(&to_base36(millis.max(0) as u64));
    for _ in 0..6 {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "LOYW3V28");
    }

    #[test]
    fn test_order_id_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = order_id_at(1_700_000_000_000, &mut rng);
        assert!(id.starts_with("ORDLOYW3V28"));
        assert_eq!(id.len(), 3 + 8 + 6);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = generate_order_id();
        let b = generate_order_id();
        assert_ne!(a, b);
    }
}
