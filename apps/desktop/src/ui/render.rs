//! Plain-text rendering of the composite screen.

use client_core::{MainView, Route, ScreenLoad};

use crate::controller::events::UiError;

pub fn screen_lines(load: &ScreenLoad, is_data_loaded: bool) -> Vec<String> {
    let mut lines = Vec::new();

    let Some(views) = &load.views else {
        lines.push("== Login Required ==".to_string());
        lines.push("  You are signed out. Sign in to view companies.".to_string());
        return lines;
    };

    match &views.user_info {
        Ok(user) => lines.push(format!("User: {}", user.display_name())),
        Err(_) => lines.push("User: (unavailable)".to_string()),
    }

    match (&views.main, load.route) {
        (Ok(MainView::Companies(companies)), _) => {
            lines.push("== Company List ==".to_string());
            for company in companies {
                lines.push(format!(
                    "  [{}] {} ({}) target {} USD, investment {} USD, {} investors",
                    company.id,
                    company.name,
                    company.region,
                    format_amount(company.target_usd),
                    format_amount(company.investment_usd),
                    company.no_investors
                ));
            }
        }
        (Ok(MainView::Transactions(data)), _) => {
            lines.push(format!("== Today's Transactions for {} ==", data.company.name));
            for transaction in &data.transactions {
                lines.push(format!(
                    "  #{} investor {} amount {} USD",
                    transaction.id,
                    transaction.investor_id,
                    format_amount(transaction.amount_usd)
                ));
            }
        }
        (Err(err), Route::Transactions(company_id)) if err.is_expected_business_error() => {
            lines.push(format!(
                "Company {company_id} is not available; returning to the company list"
            ));
        }
        (Err(_), _) => lines.push("(main view failed to load)".to_string()),
    }

    lines.push(format!(
        "Session buttons: {}",
        if is_data_loaded { "enabled" } else { "disabled" }
    ));
    lines
}

pub fn error_summary(error: &UiError) -> String {
    let summary = format!(
        "Problem encountered ({:?}/{:?}): {}",
        error.context(),
        error.category(),
        error.message()
    );
    if error.requires_reauth() {
        format!("{summary}. Sign in again to continue.")
    } else {
        summary
    }
}

/// Whole dollars with thousands separators.
pub fn format_amount(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::UiErrorContext;
    use client_core::{RoundId, ViewResults};
    use shared::{
        domain::{CompanyId, UserInfo},
        error::{ApiError, ErrorCode},
    };

    #[test]
    fn formats_amounts_with_thousands_separators() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1000), "1,000");
        assert_eq!(format_amount(1_234_567), "1,234,567");
        assert_eq!(format_amount(-650_000), "-650,000");
    }

    #[test]
    fn renders_redirect_notice_for_hidden_company() {
        let load = ScreenLoad {
            route: Route::Transactions(CompanyId(3)),
            views: Some(ViewResults {
                round: RoundId(2),
                main: Err(ApiError::new(ErrorCode::CompanyNotFound, "hidden").with_status(404)),
                user_info: Ok(UserInfo {
                    given_name: "Guest".into(),
                    family_name: "User".into(),
                }),
            }),
            redirect: Some(Route::Home),
        };

        let lines = screen_lines(&load, false);
        assert_eq!(lines[0], "User: Guest User");
        assert!(lines[1].contains("Company 3 is not available"));
        assert_eq!(lines.last().map(String::as_str), Some("Session buttons: disabled"));
    }

    #[test]
    fn auth_errors_ask_the_user_to_sign_in_again() {
        let auth = UiError::from_api(
            UiErrorContext::Login,
            &ApiError::login_required("token rejected").with_status(401),
        );
        assert!(error_summary(&auth).ends_with("Sign in again to continue."));

        let server = UiError::from_api(
            UiErrorContext::LoadData,
            &ApiError::new(ErrorCode::ServerError, "boom").with_status(500),
        );
        assert!(!error_summary(&server).contains("Sign in again"));
    }

    #[test]
    fn renders_login_required_screen() {
        let load = ScreenLoad {
            route: Route::LoginRequired,
            views: None,
            redirect: None,
        };
        assert_eq!(screen_lines(&load, false)[0], "== Login Required ==");
    }
}
