use chrono::NaiveDateTime;

use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, CompOffApproval, CompOffReward, Penalty, PenaltyType,
    SystemRemark,
};

pub const COMP_OFF_FULL_DAY_HOURS: f64 = 8.0;
pub const COMP_OFF_HALF_DAY_HOURS: f64 = 4.0;
/// Late days per month that are regularizable before the deduction kicks in.
pub const LATE_ALLOWANCE_PER_MONTH: u32 = 3;
pub const LATE_DEDUCTION: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverInput<'a> {
    /// Leave type when the day is covered by approved leave.
    pub approved_leave: Option<&'a str>,
    pub is_late_entry: bool,
    /// Late days strictly before this one, same calendar month.
    pub late_count_this_month: u32,
    pub net_work_hours: f64,
    pub is_holiday_work: bool,
    pub min_full_day_hours: f64,
    pub min_half_day_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub status: AttendanceStatus,
    pub remark: Option<SystemRemark>,
    pub penalty: Penalty,
    pub rewards: CompOffReward,
}

impl Resolution {
    fn status(status: AttendanceStatus, remark: Option<SystemRemark>) -> Self {
        Self {
            status,
            remark,
            penalty: Penalty::default(),
            rewards: CompOffReward::default(),
        }
    }
}

/// First matching rule wins. Penalty and rewards are always produced in full.
pub fn resolve(input: &ResolverInput<'_>) -> Resolution {
    if input.is_holiday_work {
        return comp_off(input.net_work_hours);
    }

    if let Some(leave_type) = input.approved_leave {
        return Resolution::status(
            AttendanceStatus::Absent,
            Some(SystemRemark::LeaveRegularizationRequired {
                leave_type: leave_type.to_string(),
            }),
        );
    }

    if input.is_late_entry {
        let occurrence = input.late_count_this_month + 1;
        if occurrence > LATE_ALLOWANCE_PER_MONTH {
            return Resolution {
                penalty: Penalty::applied(PenaltyType::LateDeduction, LATE_DEDUCTION),
                ..Resolution::status(
                    AttendanceStatus::HalfDay,
                    Some(SystemRemark::LatePenalty { occurrence }),
                )
            };
        }
        return Resolution::status(
            AttendanceStatus::Absent,
            Some(SystemRemark::LateRegularizationRequired { occurrence }),
        );
    }

    if input.net_work_hours >= input.min_full_day_hours {
        Resolution::status(AttendanceStatus::Present, None)
    } else if input.net_work_hours >= input.min_half_day_hours {
        Resolution::status(AttendanceStatus::HalfDay, None)
    } else {
        Resolution::status(
            AttendanceStatus::Absent,
            Some(SystemRemark::InsufficientHours {
                min_hours: input.min_half_day_hours,
            }),
        )
    }
}

fn comp_off(net_work_hours: f64) -> Resolution {
    let credit = if net_work_hours >= COMP_OFF_FULL_DAY_HOURS {
        1.0
    } else if net_work_hours >= COMP_OFF_HALF_DAY_HOURS {
        0.5
    } else {
        0.0
    };

    let (rewards, remark) = if credit > 0.0 {
        (
            CompOffReward {
                is_eligible: true,
                comp_off_credit: credit,
                approval_status: Some(CompOffApproval::AutoApproved),
            },
            SystemRemark::CompOffEarned { credit },
        )
    } else {
        (
            CompOffReward {
                is_eligible: false,
                comp_off_credit: 0.0,
                approval_status: Some(CompOffApproval::Rejected),
            },
            SystemRemark::CompOffNotEligible {
                min_hours: COMP_OFF_HALF_DAY_HOURS,
            },
        )
    };

    Resolution {
        status: AttendanceStatus::Holiday,
        remark: Some(remark),
        penalty: Penalty::default(),
        rewards,
    }
}

/// Terminal resolution of a checked-out record, shared by the Out punch and
/// the finalizer's auto-close.
pub fn resolve_checkout(record: &mut AttendanceRecord, prior_late_days: u32, out_at: NaiveDateTime) {
    record.flags.is_early_exit = out_at < record.shift.ends_on(record.date);

    let resolution = resolve(&ResolverInput {
        approved_leave: record.leave_type.as_deref(),
        is_late_entry: record.flags.is_late_entry,
        late_count_this_month: prior_late_days,
        net_work_hours: record.summary.net_work_hours,
        is_holiday_work: record.is_holiday_work(),
        min_full_day_hours: record.shift.min_full_day_hours,
        min_half_day_hours: record.shift.min_half_day_hours,
    });

    record.status = resolution.status;
    record.system_remark = resolution.remark;
    record.penalty = resolution.penalty;
    record.rewards = resolution.rewards;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(net_work_hours: f64) -> ResolverInput<'static> {
        ResolverInput {
            approved_leave: None,
            is_late_entry: false,
            late_count_this_month: 0,
            net_work_hours,
            is_holiday_work: false,
            min_full_day_hours: 7.0,
            min_half_day_hours: 4.0,
        }
    }

    #[test]
    fn clean_entry_thresholds() {
        assert_eq!(resolve(&clean(7.0)).status, AttendanceStatus::Present);
        assert_eq!(resolve(&clean(6.99)).status, AttendanceStatus::HalfDay);
        assert_eq!(resolve(&clean(4.0)).status, AttendanceStatus::HalfDay);

        let short = resolve(&clean(3.5));
        assert_eq!(short.status, AttendanceStatus::Absent);
        assert_eq!(
            short.remark.unwrap().to_string(),
            "Insufficient Hours (< 4 hrs)"
        );
    }

    #[test]
    fn first_three_late_days_need_regularization() {
        let resolution = resolve(&ResolverInput {
            is_late_entry: true,
            late_count_this_month: 2,
            ..clean(8.0)
        });

        assert_eq!(resolution.status, AttendanceStatus::Absent);
        assert_eq!(
            resolution.remark,
            Some(SystemRemark::LateRegularizationRequired { occurrence: 3 })
        );
        assert!(!resolution.penalty.is_applied);
    }

    #[test]
    fn fourth_late_day_is_half_day_with_deduction() {
        let resolution = resolve(&ResolverInput {
            is_late_entry: true,
            late_count_this_month: 3,
            ..clean(8.0)
        });

        assert_eq!(resolution.status, AttendanceStatus::HalfDay);
        assert_eq!(resolution.remark.unwrap().to_string(), "Late Penalty (#4)");
        assert_eq!(
            resolution.penalty,
            Penalty::applied(PenaltyType::LateDeduction, 0.5)
        );
    }

    #[test]
    fn approved_leave_beats_lateness() {
        let resolution = resolve(&ResolverInput {
            approved_leave: Some("Casual"),
            is_late_entry: true,
            late_count_this_month: 5,
            ..clean(6.0)
        });

        assert_eq!(resolution.status, AttendanceStatus::Absent);
        assert!(
            resolution
                .remark
                .unwrap()
                .to_string()
                .contains("Work on Approved Leave")
        );
        assert!(!resolution.penalty.is_applied);
    }

    #[test]
    fn holiday_work_accrues_comp_off() {
        let holiday = |hours| {
            resolve(&ResolverInput {
                is_holiday_work: true,
                approved_leave: Some("Casual"),
                ..clean(hours)
            })
        };

        let full = holiday(8.0);
        assert_eq!(full.status, AttendanceStatus::Holiday);
        assert_eq!(full.rewards.comp_off_credit, 1.0);

        let half = holiday(5.0);
        assert_eq!(half.rewards.comp_off_credit, 0.5);
        assert_eq!(
            half.rewards.approval_status,
            Some(CompOffApproval::AutoApproved)
        );

        let none = holiday(2.0);
        assert!(!none.rewards.is_eligible);
        assert_eq!(none.rewards.approval_status, Some(CompOffApproval::Rejected));
        assert_eq!(none.status, AttendanceStatus::Holiday);
    }

    #[test]
    fn thresholds_come_from_the_input() {
        let resolution = resolve(&ResolverInput {
            min_full_day_hours: 8.0,
            min_half_day_hours: 5.0,
            ..clean(4.5)
        });

        assert_eq!(
            resolution.remark,
            Some(SystemRemark::InsufficientHours { min_hours: 5.0 })
        );
    }
}
