//! 门户页面结构
//!
//! 门户改版时只需要修改这里（以及极少数情况下 session / filing 的步骤顺序）

use crate::infrastructure::Probe;
use crate::models::RegistrationType;

// ========== 登录页 ==========

pub const PIN_INPUT: &str = "#logid";
/// 输入 PIN 后的"继续"按钮
pub const PIN_CONTINUE_BUTTON: &str = "a[onclick*='CheckPIN']";
pub const PASSWORD_INPUT: &str = "input[name='xxZTT9p2wQ']";
pub const CAPTCHA_IMAGE: &str = "#captcha_img";
pub const CAPTCHA_INPUT: &str = "#captcahText";
pub const LOGIN_BUTTON: &str = "#loginButton";

/// 仍停留在登录页时可见
pub const NOT_LOGGED_IN_MARKER: Probe = Probe::Selector(LOGIN_BUTTON);

// ========== 登录结果横幅 ==========

/// 登录后可能出现的横幅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Banner {
    WrongArithmetic,
    InvalidCredentials,
    AccountLocked,
    PasswordExpired,
}

/// 横幅文本（小写匹配）→ 横幅类型
pub static BANNERS: phf::Map<&'static str, Banner> = phf::phf_map! {
    "wrong result of the arithmetic operation" => Banner::WrongArithmetic,
    "invalid login id or password" => Banner::InvalidCredentials,
    "your account has been locked" => Banner::AccountLocked,
    "your password has expired" => Banner::PasswordExpired,
};

/// 某类横幅对应的文本
pub fn banner_text(banner: Banner) -> &'static str {
    BANNERS
        .entries()
        .find(|(_, kind)| **kind == banner)
        .map(|(text, _)| *text)
        .unwrap_or_default()
}

// ========== 零申报向导 ==========

pub const MENU_RETURNS: &str = "#ddtopmenubar a[rel='Returns']";
pub const SUBMENU_NIL_RETURN: &str = "a[onclick*='fileNilReturn']";
pub const REGISTRATION_TYPE_SELECT: &str = "#regType";
pub const WIZARD_NEXT_BUTTON: &str = "#btnContinue";
pub const DECLARATION_CHECKBOX: &str = "#chkDeclaration";
pub const SUBMIT_BUTTON: &str = "#btnSubmit";
pub const RECEIPT_LINK: &str = "a[href*='downloadReturnReceipt']";

/// 下拉框中申报人类别的取值
pub fn registration_option(registration_type: RegistrationType) -> &'static str {
    match registration_type {
        RegistrationType::Individual => "IND",
        RegistrationType::Corporate => "NON_IND",
    }
}
