//! 验证码求解 - 业务能力层
//!
//! 把算术验证码图片变成一个整数答案。截图由调用方提供，
//! 因此本模块本身是确定性的，可以用固定图片测试。

use std::future::Future;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{AppError, BrowserError, CaptchaError};
use crate::models::{CaptchaAttempt, Operator};
use crate::services::ocr::OcrEngine;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").unwrap_or_else(|e| unreachable!("固定正则: {e}")))
}

/// 从 OCR 文本中解析算式
///
/// 先去掉末尾空白，再裁掉 `trim_chars` 个字符（渲染时多出的尾部符号），
/// 然后要求恰好两个数字；运算符先找 `+` 再找 `-`，都没有就判定失败
pub fn parse_challenge(
    raw: &str,
    trim_chars: usize,
    attempt: u32,
) -> Result<CaptchaAttempt, CaptchaError> {
    let trimmed = raw.trim_end();
    let keep = trimmed.chars().count().saturating_sub(trim_chars);
    let cleaned: String = trimmed.chars().take(keep).collect();

    let numbers: Vec<i64> = number_pattern()
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let (lhs, rhs) = match numbers.as_slice() {
        [lhs, rhs] => (*lhs, *rhs),
        _ => {
            return Err(CaptchaError::Extraction {
                attempt,
                found: numbers.len(),
                text: raw.to_string(),
            })
        }
    };

    let operator = if cleaned.contains('+') {
        Operator::Add
    } else if cleaned.contains('-') {
        Operator::Subtract
    } else {
        return Err(CaptchaError::UnsupportedOperator {
            attempt,
            text: raw.to_string(),
        });
    };

    let answer = operator
        .apply(lhs, rhs)
        .ok_or_else(|| CaptchaError::Overflow {
            attempt,
            text: raw.to_string(),
        })?;

    Ok(CaptchaAttempt {
        attempt,
        raw_text: raw.to_string(),
        operands: (lhs, rhs),
        operator,
        answer,
    })
}

/// 验证码求解器
///
/// 职责：
/// - 识别 → 解析 → 计算
/// - 失败时重新截图重试，次数有上限
/// - 达到上限后返回 `Unresolved`，由会话层重新开始整轮登录
#[derive(Clone)]
pub struct CaptchaSolver {
    ocr: Arc<dyn OcrEngine>,
    max_attempts: u32,
    trim_chars: usize,
}

impl CaptchaSolver {
    pub fn new(ocr: Arc<dyn OcrEngine>, max_attempts: u32, trim_chars: usize) -> Self {
        Self {
            ocr,
            max_attempts,
            trim_chars,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 识别一张已截好的图片
    pub async fn solve_image(
        &self,
        image: &[u8],
        attempt: u32,
    ) -> Result<CaptchaAttempt, CaptchaError> {
        let text = self
            .ocr
            .recognize(image)
            .await
            .map_err(|e| CaptchaError::Ocr {
                attempt,
                message: e.to_string(),
            })?;
        parse_challenge(&text, self.trim_chars, attempt)
    }

    /// 反复截图识别，直到得到答案或达到上限
    ///
    /// 每次重试都会调用 `capture` 重新截图；截图本身失败属于导航错误，直接返回
    pub async fn solve<F, Fut>(&self, mut capture: F) -> Result<CaptchaAttempt, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, BrowserError>>,
    {
        for attempt in 1..=self.max_attempts {
            let image = capture().await?;
            match self.solve_image(&image, attempt).await {
                Ok(solved) => {
                    debug!(
                        "验证码识别成功: {} {} {} = {} (第 {} 次)",
                        solved.operands.0,
                        solved.operator.symbol(),
                        solved.operands.1,
                        solved.answer,
                        attempt
                    );
                    return Ok(solved);
                }
                Err(e) => warn!("⚠️ 验证码识别失败 ({}/{}): {}", attempt, self.max_attempts, e),
            }
        }

        Err(CaptchaError::Unresolved {
            attempts: self.max_attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按顺序返回预设文本的 OCR
    struct ScriptedOcr {
        outputs: Mutex<VecDeque<&'static str>>,
    }

    impl ScriptedOcr {
        fn new(outputs: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.iter().copied().collect()),
            })
        }
    }

    #[async_trait::async_trait]
    impl OcrEngine for ScriptedOcr {
        async fn recognize(&self, _image: &[u8]) -> anyhow::Result<String> {
            match self.outputs.lock().unwrap().pop_front() {
                Some(text) => Ok(text.to_string()),
                None => anyhow::bail!("no more output"),
            }
        }
    }

    #[test]
    fn test_trailing_artifact_is_trimmed() {
        let solved = parse_challenge("12+7-", 1, 1).unwrap();
        assert_eq!(solved.operands, (12, 7));
        assert_eq!(solved.operator, Operator::Add);
        assert_eq!(solved.answer, 19);
    }

    #[test]
    fn test_answer_follows_extraction_order() {
        for (lhs, rhs) in [(3, 9), (40, 2), (0, 0), (15, 15), (7, 88)] {
            let add = parse_challenge(&format!("{lhs} + {rhs} ?"), 1, 1).unwrap();
            assert_eq!(add.answer, lhs + rhs);
            let sub = parse_challenge(&format!("{lhs} - {rhs} ?\n"), 1, 1).unwrap();
            assert_eq!(sub.answer, lhs - rhs);
            assert_eq!(sub.operator, Operator::Subtract);
        }
    }

    #[test]
    fn test_plus_is_checked_before_minus() {
        let solved = parse_challenge("5+-3?", 1, 1).unwrap();
        assert_eq!(solved.operator, Operator::Add);
        assert_eq!(solved.answer, 8);
    }

    #[test]
    fn test_wrong_number_count_fails() {
        assert!(matches!(
            parse_challenge("12+?", 1, 2),
            Err(CaptchaError::Extraction { attempt: 2, found: 1, .. })
        ));
        assert!(matches!(
            parse_challenge("1+2+3?", 1, 1),
            Err(CaptchaError::Extraction { found: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_operator_is_not_guessed() {
        assert!(matches!(
            parse_challenge("6x4?", 1, 1),
            Err(CaptchaError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_overflowing_operands_fail_the_attempt() {
        assert!(matches!(
            parse_challenge("9223372036854775807+1?", 1, 3),
            Err(CaptchaError::Overflow { attempt: 3, .. })
        ));
        assert!(matches!(
            parse_challenge("0-9223372036854775808?", 1, 1),
            Err(CaptchaError::Extraction { found: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_overflow_is_retried_with_new_capture() {
        let solver = CaptchaSolver::new(
            ScriptedOcr::new(&["9223372036854775807+1?", "4+5?"]),
            3,
            1,
        );

        let solved = solver.solve(|| async { Ok(vec![0u8; 4]) }).await.unwrap();

        assert_eq!(solved.answer, 9);
        assert_eq!(solved.attempt, 2);
    }

    #[tokio::test]
    async fn test_retries_with_fresh_capture() {
        let solver = CaptchaSolver::new(ScriptedOcr::new(&["garbage", "3*4?", "30-4?"]), 5, 1);
        let captures = Mutex::new(0u32);

        let solved = solver
            .solve(|| {
                *captures.lock().unwrap() += 1;
                async { Ok(vec![0u8; 4]) }
            })
            .await
            .unwrap();

        assert_eq!(solved.answer, 26);
        assert_eq!(solved.attempt, 3);
        assert_eq!(*captures.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_never_exceeds_max_attempts() {
        let solver = CaptchaSolver::new(ScriptedOcr::new(&["?"; 10]), 4, 1);
        let mut captures = 0u32;

        let result = solver
            .solve(|| {
                captures += 1;
                async { Ok(Vec::new()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(AppError::Captcha(CaptchaError::Unresolved { attempts: 4 }))
        ));
        assert_eq!(captures, 4);
    }

    #[tokio::test]
    async fn test_capture_error_is_propagated() {
        let solver = CaptchaSolver::new(ScriptedOcr::new(&["1+1?"]), 3, 1);
        let result = solver
            .solve(|| async {
                Err(BrowserError::ElementNotFound {
                    selector: "#captcha_img".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(AppError::Browser(_))));
    }
}
