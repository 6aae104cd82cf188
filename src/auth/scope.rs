use crate::error::{Error, Result};
use crate::types::{Claims, ORG_LEVEL_COMPANY_ID, Scope};

/// Scope a request may touch, given what the client asked for.
///
/// Admins get the requested scope as-is (an absent field stays unrestricted).
/// Everyone else is pinned to the scope of their credential, whatever they
/// asked for.
#[must_use]
pub fn resolve_scope(claims: &Claims, requested: &Scope) -> Scope {
    if claims.admin {
        requested.clone()
    } else {
        Scope::tenant(claims.org.clone(), claims.company_id)
    }
}

/// Resolves the concrete (org, company) a write lands in.
///
/// Unlike reads, a write whose declared scope disagrees with a non-admin
/// credential is rejected instead of rewritten. Without a credential the
/// declared org is trusted as-is (legacy body-scoped ingestion).
pub fn resolve_write_scope(claims: Option<&Claims>, declared: &Scope) -> Result<(String, i64)> {
    let Some(claims) = claims else {
        let org = declared
            .org
            .clone()
            .ok_or_else(|| Error::validation("company_token is required"))?;
        return Ok((org, declared.company_id.unwrap_or(ORG_LEVEL_COMPANY_ID)));
    };

    let effective = resolve_scope(claims, declared);

    if !claims.admin {
        if declared.org.is_some() && declared.org != effective.org {
            return Err(Error::access_denied(format!(
                "credential for '{}' cannot write to '{}'",
                claims.org,
                declared.org.as_deref().unwrap_or_default()
            )));
        }
        if declared.company_id.is_some() && declared.company_id != effective.company_id {
            return Err(Error::access_denied(format!(
                "credential for company {} cannot write to company {}",
                claims.company_id,
                declared.company_id.unwrap_or_default()
            )));
        }
    }

    let company_id = match (&effective.org, effective.company_id) {
        (_, Some(company_id)) => company_id,
        (Some(_), None) => ORG_LEVEL_COMPANY_ID,
        (None, None) => claims.company_id,
    };
    let org = effective.org.unwrap_or_else(|| claims.org.clone());

    Ok((org, company_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(org: &str, company_id: i64, admin: bool) -> Claims {
        Claims {
            org: org.to_string(),
            company_id,
            admin,
            iat: 0,
            exp: i64::MAX,
            jti: String::new(),
        }
    }

    fn requested(org: Option<&str>, company_id: Option<i64>) -> Scope {
        Scope {
            org: org.map(str::to_string),
            company_id,
        }
    }

    #[test]
    fn test_non_admin_is_forced_to_own_scope() {
        let scope = resolve_scope(&claims("orgA", 3, false), &requested(Some("orgB"), Some(9)));
        assert_eq!(scope, Scope::tenant("orgA", 3));

        let scope = resolve_scope(&claims("orgA", 3, false), &Scope::unrestricted());
        assert_eq!(scope, Scope::tenant("orgA", 3));
    }

    #[test]
    fn test_admin_gets_requested_scope() {
        let scope = resolve_scope(&claims("root", 0, true), &requested(Some("orgB"), Some(9)));
        assert_eq!(scope, requested(Some("orgB"), Some(9)));

        let scope = resolve_scope(&claims("root", 0, true), &Scope::unrestricted());
        assert_eq!(scope, Scope::unrestricted());
    }

    #[test]
    fn test_write_without_credential_uses_declared_org() {
        let (org, company) = resolve_write_scope(None, &requested(Some("orgA"), None)).unwrap();
        assert_eq!(org, "orgA");
        assert_eq!(company, ORG_LEVEL_COMPANY_ID);

        let (_, company) = resolve_write_scope(None, &requested(Some("orgA"), Some(4))).unwrap();
        assert_eq!(company, 4);
    }

    #[test]
    fn test_write_without_any_scope_is_invalid() {
        let err = resolve_write_scope(None, &Scope::unrestricted()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_write_conflicting_org_is_denied() {
        let err = resolve_write_scope(
            Some(&claims("orgB", 0, false)),
            &requested(Some("orgA"), None),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[test]
    fn test_write_conflicting_company_is_denied() {
        let err = resolve_write_scope(
            Some(&claims("orgA", 1, false)),
            &requested(Some("orgA"), Some(2)),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AccessDenied(_)));
    }

    #[test]
    fn test_write_undeclared_scope_comes_from_claim() {
        let (org, company) =
            resolve_write_scope(Some(&claims("orgA", 5, false)), &Scope::unrestricted()).unwrap();
        assert_eq!((org.as_str(), company), ("orgA", 5));
    }

    #[test]
    fn test_admin_may_write_anywhere() {
        let (org, company) = resolve_write_scope(
            Some(&claims("root", 0, true)),
            &requested(Some("orgZ"), Some(8)),
        )
        .unwrap();
        assert_eq!((org.as_str(), company), ("orgZ", 8));

        let (org, company) =
            resolve_write_scope(Some(&claims("root", 2, true)), &Scope::unrestricted()).unwrap();
        assert_eq!((org.as_str(), company), ("root", 2));
    }
}
