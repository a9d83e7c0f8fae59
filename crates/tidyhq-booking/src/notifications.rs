// SPDX-FileCopyrightText: 2026 TidyHQ Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification composition.
//!
//! Turns booking events into [`NewJob`]s. Nothing here talks to a provider;
//! the jobs ride along in the same change set as the mutation that caused
//! them and are delivered later by the dispatcher.

use tidyhq_config::model::NotificationsConfig;
use tidyhq_core::{
    AssignmentRole, Booking, BookingStatus, Channel, NewJob, NotificationPayload, Staff,
};

/// A staff member together with their role on a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub staff: Staff,
    pub role: AssignmentRole,
}

/// Builds notification jobs from booking events.
#[derive(Debug, Clone)]
pub struct Composer {
    config: NotificationsConfig,
    max_attempts: u32,
}

impl Composer {
    pub fn new(config: NotificationsConfig, max_attempts: u32) -> Self {
        Self {
            config,
            max_attempts,
        }
    }

    /// Jobs that accompany a status transition.
    pub fn for_transition(
        &self,
        booking: &Booking,
        target: BookingStatus,
        team: &[TeamMember],
        reason: Option<&str>,
    ) -> Vec<NewJob> {
        match target {
            BookingStatus::Confirmed => self.customer_confirmation(booking, team),
            BookingStatus::Cancelled => self.cancellation(booking, team, reason),
            BookingStatus::Completed => self.completion(booking),
            BookingStatus::Pending => Vec::new(),
        }
    }

    /// Tells a newly assigned staff member about the visit.
    pub fn staff_assignment(&self, booking: &Booking, member: &TeamMember) -> Option<NewJob> {
        let subject = format!("New {} assignment: {}", role_label(member.role), when(booking));
        let text = format!(
            "Hi {},\n\nYou have been assigned as {} for a {} clean on {} ({} minutes).\nAddress: {}\nCustomer: {}{}\n\nBooking {}",
            member.staff.name,
            role_label(member.role),
            booking.service_type,
            when(booking),
            booking.duration_minutes,
            booking.address,
            booking.customer.name,
            booking
                .notes
                .as_deref()
                .map(|n| format!("\nNotes: {n}"))
                .unwrap_or_default(),
            booking.id,
        );
        let sms = format!(
            "{}: you're the {} for {} at {}. Booking {}.",
            self.config.business_name,
            role_label(member.role),
            when(booking),
            booking.address,
            booking.id,
        );
        self.to_staff(booking, &member.staff, subject, text, sms)
    }

    /// Announces the assigned team to the customer.
    pub fn team_announcement(&self, booking: &Booking, team: &[TeamMember]) -> Vec<NewJob> {
        let subject = format!("Your cleaning team for {}", when(booking));
        let text = format!(
            "Hi {},\n\nYour {} clean on {} will be handled by {}.{}",
            booking.customer.name,
            booking.service_type,
            when(booking),
            team_names(team),
            self.sign_off(),
        );
        let sms = format!(
            "{}: your team for {} is {}.",
            self.config.business_name,
            when(booking),
            team_names(team)
        );
        self.to_customer(booking, subject, text, sms).into_iter().collect()
    }

    fn customer_confirmation(&self, booking: &Booking, team: &[TeamMember]) -> Vec<NewJob> {
        let team_line = if team.is_empty() {
            "We'll let you know who is coming shortly.".to_string()
        } else {
            format!("Your team: {}.", team_names(team))
        };
        let subject = format!("Booking confirmed: {}", when(booking));
        let text = format!(
            "Hi {},\n\nYour {} clean at {} on {} is confirmed. {}\nTotal: {}{}",
            booking.customer.name,
            booking.service_type,
            booking.address,
            when(booking),
            team_line,
            money(booking.total_cents),
            self.sign_off(),
        );
        let sms = format!(
            "{}: booking {} confirmed for {}. {}",
            self.config.business_name,
            booking.id,
            when(booking),
            team_line
        );
        self.to_customer(booking, subject, text, sms).into_iter().collect()
    }

    fn cancellation(
        &self,
        booking: &Booking,
        team: &[TeamMember],
        reason: Option<&str>,
    ) -> Vec<NewJob> {
        let reason_line = reason
            .map(|r| format!(" Reason: {r}"))
            .unwrap_or_default();
        let mut jobs = Vec::new();

        let customer = &booking.customer;
        if self.config.cancellation_sms {
            if let Some(phone) = &customer.phone {
                let sms = format!(
                    "{}: your clean on {} has been cancelled.{}",
                    self.config.business_name,
                    when(booking),
                    reason_line
                );
                jobs.push(self.job(booking, Channel::Sms, NotificationPayload::text(phone, sms)));
            }
        }
        if self.config.cancellation_email {
            if let Some(email) = &customer.email {
                let text = format!(
                    "Hi {},\n\nYour {} clean on {} has been cancelled.{}{}",
                    customer.name,
                    booking.service_type,
                    when(booking),
                    reason_line,
                    self.sign_off(),
                );
                let payload = NotificationPayload::email(
                    email,
                    format!("Booking cancelled: {}", when(booking)),
                    text.clone(),
                )
                .with_html(html(&text));
                jobs.push(self.job(booking, Channel::Email, payload));
            }
        }

        for member in team {
            let subject = format!("Cancelled: {}", when(booking));
            let text = format!(
                "Hi {},\n\nThe {} clean at {} on {} (booking {}) has been cancelled.{}",
                member.staff.name,
                booking.service_type,
                booking.address,
                when(booking),
                booking.id,
                reason_line,
            );
            let sms = format!(
                "{}: booking {} on {} is cancelled.",
                self.config.business_name,
                booking.id,
                when(booking)
            );
            jobs.extend(self.to_staff(booking, &member.staff, subject, text, sms));
        }
        jobs
    }

    fn completion(&self, booking: &Booking) -> Vec<NewJob> {
        if !self.config.completion_email {
            return Vec::new();
        }
        let Some(email) = &booking.customer.email else {
            return Vec::new();
        };
        let text = format!(
            "Hi {},\n\nThanks for choosing {}! Your {} clean on {} is complete.\nTotal: {}{}",
            booking.customer.name,
            self.config.business_name,
            booking.service_type,
            when(booking),
            money(booking.total_cents),
            self.sign_off(),
        );
        let payload = NotificationPayload::email(
            email,
            format!("Thank you from {}", self.config.business_name),
            text.clone(),
        )
        .with_html(html(&text));
        vec![self.job(booking, Channel::Email, payload)]
    }

    /// Email when the customer has an address, SMS otherwise.
    fn to_customer(
        &self,
        booking: &Booking,
        subject: String,
        text: String,
        sms: String,
    ) -> Option<NewJob> {
        let customer = &booking.customer;
        if let Some(email) = &customer.email {
            let payload = NotificationPayload::email(email, subject, text.clone()).with_html(html(&text));
            return Some(self.job(booking, Channel::Email, payload));
        }
        customer
            .phone
            .as_ref()
            .map(|phone| self.job(booking, Channel::Sms, NotificationPayload::text(phone, sms)))
    }

    /// Email when the staff member has an address, SMS otherwise.
    fn to_staff(
        &self,
        booking: &Booking,
        staff: &Staff,
        subject: String,
        text: String,
        sms: String,
    ) -> Option<NewJob> {
        if let Some(email) = &staff.email {
            let payload = NotificationPayload::email(email, subject, text);
            return Some(self.job(booking, Channel::Email, payload));
        }
        staff
            .phone
            .as_ref()
            .map(|phone| self.job(booking, Channel::Sms, NotificationPayload::text(phone, sms)))
    }

    fn job(&self, booking: &Booking, channel: Channel, payload: NotificationPayload) -> NewJob {
        NewJob::new(channel, payload)
            .for_booking(booking.id.clone())
            .with_max_attempts(self.max_attempts)
    }

    fn sign_off(&self) -> String {
        match &self.config.contact_phone {
            Some(phone) => format!(
                "\n\nQuestions? Call us on {phone}.\n{}",
                self.config.business_name
            ),
            None => format!("\n\n{}", self.config.business_name),
        }
    }
}

fn when(booking: &Booking) -> String {
    format!(
        "{} at {}",
        booking.scheduled_date.format("%a %-d %b %Y"),
        booking.start_time.format("%H:%M")
    )
}

fn role_label(role: AssignmentRole) -> &'static str {
    match role {
        AssignmentRole::Lead => "lead cleaner",
        AssignmentRole::Assistant => "assistant",
    }
}

fn team_names(team: &[TeamMember]) -> String {
    team.iter()
        .map(|m| match m.role {
            AssignmentRole::Lead => format!("{} (lead)", m.staff.name),
            AssignmentRole::Assistant => m.staff.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

/// Paragraph-per-blank-line HTML rendering of a plain-text body.
fn html(text: &str) -> String {
    text.split("\n\n")
        .map(|para| format!("<p>{}</p>", escape(para).replace('\n', "<br>")))
        .collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
