//! Profiles. Every write bumps the owning unique identity.

use affil_core::model::Profile;
use rusqlite::{Connection, params};

use crate::{
  Result,
  db::{exec, query_opt, touch},
  encode::{PROFILE_COLUMNS, RawProfile},
};

pub fn get(conn: &Connection, uuid: &str) -> Result<Option<Profile>> {
  let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE uuid = ?1");
  query_opt(conn, &sql, [uuid], RawProfile::from_row)?.map(RawProfile::into_profile).transpose()
}

pub fn require(conn: &Connection, uuid: &str) -> Result<Profile> {
  get(conn, uuid)?.ok_or_else(|| affil_core::Error::NotFound(format!("profile '{uuid}'")).into())
}

fn validate(conn: &Connection, profile: &Profile) -> Result<()> {
  profile.validate()?;
  if let Some(code) = profile.country_code.as_deref() {
    let known = query_opt(conn, "SELECT 1 FROM countries WHERE code = ?1", [code], |_| Ok(()))?;
    if known.is_none() {
      return Err(
        affil_core::Error::validation("country_code", format!("'{code}' is not a known country"))
          .into(),
      );
    }
  }
  Ok(())
}

fn reread(conn: &Connection, profile: &Profile, refresh: bool) -> Result<Profile> {
  if refresh { require(conn, &profile.uuid) } else { Ok(profile.clone()) }
}

/// Insert the profile of an existing unique identity.
pub fn add(conn: &Connection, profile: &Profile, refresh: bool) -> Result<Profile> {
  validate(conn, profile)?;
  exec(
    conn,
    "INSERT INTO profiles (uuid, name, email, gender, gender_acc, is_bot, country_code)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      profile.uuid,
      profile.name,
      profile.email,
      profile.gender.map(|g| g.as_str()),
      profile.gender_acc,
      profile.is_bot,
      profile.country_code,
    ],
  )?;
  touch(conn, &profile.uuid)?;
  reread(conn, profile, refresh)
}

/// Overwrite every column of an existing profile.
pub fn edit(conn: &Connection, profile: &Profile, refresh: bool) -> Result<Profile> {
  validate(conn, profile)?;
  let res = exec(
    conn,
    "UPDATE profiles
     SET name = ?2, email = ?3, gender = ?4, gender_acc = ?5, is_bot = ?6, country_code = ?7
     WHERE uuid = ?1",
    params![
      profile.uuid,
      profile.name,
      profile.email,
      profile.gender.map(|g| g.as_str()),
      profile.gender_acc,
      profile.is_bot,
      profile.country_code,
    ],
  )?;
  if res.rows_affected != 1 {
    return Err(affil_core::Error::NotFound(format!("profile '{}'", profile.uuid)).into());
  }
  touch(conn, &profile.uuid)?;
  reread(conn, profile, refresh)
}
