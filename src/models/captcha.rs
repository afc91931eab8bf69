use serde::Serialize;

/// 验证码中的运算符，只支持加减
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Add,
    Subtract,
}

impl Operator {
    /// 按识别顺序计算 `lhs op rhs`，溢出时返回 `None`
    pub fn apply(self, lhs: i64, rhs: i64) -> Option<i64> {
        match self {
            Operator::Add => lhs.checked_add(rhs),
            Operator::Subtract => lhs.checked_sub(rhs),
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
        }
    }
}

/// 一次验证码识别结果
///
/// 每次重新截图都会生成新的实例，成功或放弃后丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptchaAttempt {
    /// 第几次尝试（从 1 开始）
    pub attempt: u32,
    /// OCR 原始文本
    pub raw_text: String,
    /// 两个操作数（识别顺序）
    pub operands: (i64, i64),
    pub operator: Operator,
    /// 计算结果
    pub answer: i64,
}
