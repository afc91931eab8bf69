use std::path::PathBuf;

use chrono::NaiveDate;

/// 文件名中的申报类型
pub const FILING_TYPE_LABEL: &str = "NIL RETURN";

/// 下载得到的回执文件
///
/// 由申报流程创建，上传服务只借用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingArtifact {
    /// 本地路径（位于请求私有的临时目录中）
    pub path: PathBuf,
    pub file_name: String,
    pub size_bytes: u64,
    pub content_type: String,
}

/// 生成确定性的回执文件名
///
/// `{name} - {pin} - NIL RETURN - ACKNOWLEDGEMENT RECEIPT - {date}.pdf`
pub fn receipt_file_name(taxpayer_name: &str, pin: &str, date: NaiveDate) -> String {
    format!(
        "{} - {} - {} - ACKNOWLEDGEMENT RECEIPT - {}.pdf",
        sanitize(taxpayer_name),
        sanitize(pin),
        FILING_TYPE_LABEL,
        date.format("%Y-%m-%d")
    )
}

/// 远端对象键：同一身份同一天总是同一个键，重复上传会覆盖
pub fn remote_receipt_key(pin: &str, date: NaiveDate) -> String {
    format!(
        "{}/{}.pdf",
        sanitize(pin).to_ascii_uppercase(),
        date.format("%Y-%m-%d")
    )
}

/// 去掉路径分隔符和控制字符
fn sanitize(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}
