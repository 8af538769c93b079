//! Static user directory and password handling.
//!
//! Accounts are compiled in. A password changed through `passwd` is kept as
//! a local override and takes precedence over the directory password.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, GradeFixError};
use crate::local::{self, LocalStorage, PasswordOverrides};

pub const MIN_PASSWORD_LEN: usize = 4;
const DEFAULT_PASSWORD: &str = "password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Teacher,
    /// Academic affairs (ฝ่ายวัดผล).
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Teacher => write!(f, "TEACHER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// The signed-in user of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub name: String,
    pub role: Role,
}

/// A directory account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

impl Account {
    pub fn user(&self) -> User {
        User {
            username: self.username.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

const NAMED_ACCOUNTS: &[(&str, &str, &str, Role)] = &[
    ("t11", "password", "สาวนิลดา ชูพันธ์", Role::Teacher),
    ("t12", "password", "สาวศิวพร รักไทรทอง", Role::Teacher),
    ("t13", "password", "สาวนาวาล มะ", Role::Teacher),
    ("t14", "password", "สาวกฤติพร พิชญาพล", Role::Teacher),
    ("t15", "password", "สาวเอรวรรณ เมืองทอง", Role::Teacher),
    ("t16", "password", "สาวทิตติยา เฟื่องเกษม", Role::Teacher),
    ("t17", "password", "สาวธันย์ชนก พลรัฐธนาสิทธิ์", Role::Teacher),
    ("t18", "password", "สุปรีดา ศรีฟ้า", Role::Teacher),
    ("t19", "password", "สาวนพมาศ สุขสวัสดิ์", Role::Teacher),
    ("t110", "password", "สืบสกุล พงษ์จุ้ย", Role::Teacher),
    ("t21", "password", "ชุติมา สุปันตี", Role::Teacher),
    ("t22", "password", "สาวณิชารัศมี สุวรรณโณ", Role::Teacher),
    ("t23", "password", "สาวทิพรัตน์ มณีนิล", Role::Teacher),
    ("t24", "password", "ธีรพล ใจกว้าง", Role::Teacher),
    ("t25", "password", "วรวัจน์ สารถวิล", Role::Teacher),
    ("t26", "password", "สาวอัจฉรา รองเมือง", Role::Teacher),
    ("t27", "password", "ว่าที่ ร.ต.ภีรวัฒน์ แช่มศรี", Role::Teacher),
    ("t28", "password", "สาวจิราภรณ์ มูลี", Role::Admin),
    ("t29", "password", "อรัญญา เกื้อสกุล", Role::Teacher),
    ("t210", "password", "เบ็ญจวรรณ รอบคอบ", Role::Teacher),
    ("t31", "password", "ณัฐวรา ยะภักดี", Role::Teacher),
    ("t32", "password", "ดิฐชัย ทับทิมทอง", Role::Teacher),
    ("t33", "password", "จตุรพร ศุกรนันทน์", Role::Teacher),
    ("t34", "password", "ถนัดกิจ ธารารักษ์", Role::Teacher),
    ("t35", "password", "สาวพัชรินทร์ (คอม) หนูพระอินทร์", Role::Teacher),
    ("t36", "password", "สาวสุชาดา ใจชื่อ", Role::Teacher),
    ("t37", "password", "ศุภวัชร สิทธินุ่น", Role::Teacher),
    ("t38", "password", "ปฐมพร เรืองจันทร์", Role::Teacher),
    ("t39", "password", "สาวปิตินันท์ ทองนอก", Role::Teacher),
    ("t41", "password", "สาวจารุวรรณ ศรีสวัสดิ์", Role::Teacher),
    ("t42", "password", "พราน เพชรไฝ", Role::Teacher),
    ("t43", "password", "พรรณศิริ เรืองจันทร์", Role::Teacher),
    ("t44", "password", "สาวซูกี สีทอง", Role::Teacher),
    ("t45", "password", "สาวกุลสิริ ทองปาน", Role::Teacher),
    ("t46", "password", "อารีฟีน อับดุลอารี", Role::Teacher),
    ("t51", "password", "สาวเจนจิรา ยมขรร", Role::Teacher),
    ("t52", "password", "อดิเทพ เวชกะ", Role::Teacher),
    ("t53", "password", "สาวมัญซุนารถ รักเงิน", Role::Teacher),
    ("t54", "password", "สาววรรลภา พรหมทอง", Role::Teacher),
    ("t55", "password", "สาวมัลลิกา ไชยวิก", Role::Teacher),
    ("t56", "password", "สาวศิรภัสสร สายะสมิต", Role::Teacher),
    ("t61", "password", "สาวเพ็ญศรี จันทร์ผ่อง", Role::Teacher),
    ("t62", "password", "สาวอรวรรยา วรศิริ", Role::Teacher),
    ("t63", "password", "ธีระพงษ์ สายทองแท้", Role::Teacher),
    ("t64", "password", "เตชสิทธิ์ ศรีสุเมธารัส", Role::Teacher),
    ("t65", "password", "เยาวรัตน์ ประสานเชื้อ", Role::Teacher),
    ("t66", "password", "ปริญญา คานทอง", Role::Teacher),
    ("Phanuwat39", "phanuwat39", "ภานุวัฒน์ ทองจันทร์", Role::Admin),
    ("t28_user", "password", "สาวจิราภรณ์ มูลี", Role::Teacher),
    ("Phanuwat_user", "password", "ภานุวัฒน์ ทองจันทร์", Role::Teacher),
];

/// All accounts: the named staff, then generated `t1..t120` and
/// `teacher1..teacher30` placeholders for staff without a named entry.
pub fn directory() -> Vec<Account> {
    let mut accounts: Vec<Account> = NAMED_ACCOUNTS
        .iter()
        .map(|&(username, password, name, role)| Account {
            username: username.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            role,
        })
        .collect();
    let taken: HashSet<String> = accounts.iter().map(|a| a.username.clone()).collect();

    let generated = (1..=120)
        .map(|i| (format!("t{i}"), format!("ครูรหัส t{i}")))
        .chain((1..=30).map(|i| (format!("teacher{i}"), format!("ครู teacher{i}"))));
    for (username, name) in generated {
        if !taken.contains(&username) {
            accounts.push(Account {
                username,
                password: DEFAULT_PASSWORD.to_string(),
                name,
                role: Role::Teacher,
            });
        }
    }
    accounts
}

/// Exact-match login against the directory plus local overrides.
pub fn authenticate(
    accounts: &[Account],
    overrides: &PasswordOverrides,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let account = accounts
        .iter()
        .find(|a| a.username == username)
        .ok_or(AuthError::InvalidCredentials)?;
    let effective = overrides
        .get(username)
        .map(String::as_str)
        .unwrap_or(&account.password);

    if password == effective {
        Ok(account.user())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Validates and applies a password change to `overrides` in memory.
pub fn change_password(
    accounts: &[Account],
    overrides: &mut PasswordOverrides,
    username: &str,
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), AuthError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if new_password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }

    let current = overrides
        .get(username)
        .cloned()
        .or_else(|| {
            accounts
                .iter()
                .find(|a| a.username == username)
                .map(|a| a.password.clone())
        })
        .ok_or(AuthError::InvalidCredentials)?;
    if old_password != current {
        return Err(AuthError::WrongOldPassword);
    }

    overrides.insert(username.to_string(), new_password.to_string());
    Ok(())
}

/// Loads overrides from local storage, changes the password, and persists.
pub fn change_password_persisted(
    storage: &LocalStorage,
    username: &str,
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), GradeFixError> {
    let mut overrides = local::load_password_overrides(storage);
    change_password(
        &directory(),
        &mut overrides,
        username,
        old_password,
        new_password,
        confirm_password,
    )?;
    local::save_password_overrides(storage, &overrides)?;
    tracing::info!(%username, "Password override saved");
    Ok(())
}
