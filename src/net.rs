//! Small helpers for rate-limit friendly networking.
//! History indexes (Hyperion) throttle aggressively, so GETs against them
//! go through `send_with_backoff`.

#[cfg(feature = "native")]
use rand::{thread_rng, Rng};

pub async fn send_with_backoff(
    rb: reqwest::RequestBuilder,
    label: &str,
    max_retries: u32,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut attempt = 0u32;
    loop {
        // Streaming bodies cannot be cloned; send those once.
        let Some(req) = rb.try_clone() else {
            return rb.send().await;
        };
        match req.send().await {
            Ok(r) => {
                if r.status().as_u16() == 429 && attempt < max_retries {
                    attempt += 1;
                    let back_ms = backoff_delay_ms(attempt);
                    log::warn!("[net] 429 {label} retry={attempt} backoff={back_ms}ms");
                    tokio::time::sleep(std::time::Duration::from_millis(back_ms)).await;
                    continue;
                }
                return Ok(r);
            }
            Err(e) => {
                if attempt < max_retries && !e.is_builder() {
                    attempt += 1;
                    let back_ms = backoff_delay_ms(attempt);
                    log::warn!("[net] err {label} retry={attempt} backoff={back_ms}ms : {e}");
                    tokio::time::sleep(std::time::Duration::from_millis(back_ms)).await;
                    continue;
                }
                return Err(e);
            }
        }
    }
}

pub(crate) fn backoff_delay_ms(attempt: u32) -> u64 {
    let base = 300u64.saturating_mul(1u64 << (attempt.clamp(1, 5) - 1)); // 300,600,1200,2400,4800
    base + jitter_ms()
}

#[cfg(feature = "native")]
fn jitter_ms() -> u64 {
    thread_rng().gen_range(0..=250)
}

#[cfg(not(feature = "native"))]
fn jitter_ms() -> u64 {
    0
}
