//! Typed operations on a logged-in [`EppSession`].
//!
//! Thin wrappers that build a [`Command`], run it through
//! [`EppSession::execute`] and pull the typed payload out of the response.
//! Registry-specific operations live next to their bindings in
//! [`registries`](crate::registries).

use std::collections::HashSet;

use crate::error::{EppError, Result};
use crate::session::EppSession;
use crate::types::{
    CheckResult, Command, CommandKind, ContactCreateRequest, ContactInfo, ContactUpdateRequest,
    DomainContact, DomainCreateRequest, DomainCreated, DomainInfo, DomainInfoRequest,
    DomainLookup, DomainRenewRequest, DomainRenewed, DomainTransferRequest, DomainUpdateRequest,
    HostCreateRequest, HostInfo, ObjectCreated, ObjectType, Period, PollMessage, Response,
    ResponseData, TransferInfo, TransferOp, status,
};

/// Domain info sent to retrieve the auth code.
///
/// Wire-identical to a domain info; registries that need a request extension
/// (EURid) attach their encode hook to this kind.
pub const AUTH_CODE_QUERY: CommandKind = CommandKind::Custom("domain:info-auth-code");

/// "Object does not exist"
const OBJECT_NOT_FOUND: u16 = 2303;

/// "Command completed successfully; no messages"
const NO_MESSAGES: u16 = 1300;

impl EppSession {
    fn unexpected_payload(&self, expected: &str, response: &Response) -> EppError {
        EppError::protocol(
            self.registry(),
            format!(
                "{} response has no {expected} data",
                response.result_code
            ),
            Some(self.binding().redact(&response.raw_xml)),
        )
    }

    /// Note a success response that carried no `<resData>`; callers fall back to request values.
    fn note_missing_res_data(&self, expected: &str, response: &Response) {
        if response.result_code == 1001 {
            log::debug!(
                "[{}] {expected} pending (1001), no resData yet",
                self.registry()
            );
        } else {
            log::warn!(
                "[{}] {} response has no {expected} data; using request values",
                self.registry(),
                response.result_code
            );
        }
    }

    // ============ Domain ============

    /// Availability check for one or more domain names.
    pub async fn check_domains<S: Into<String>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Vec<CheckResult>> {
        self.check(ObjectType::Domain, names).await
    }

    pub async fn check_contacts<S: Into<String>>(
        &mut self,
        ids: impl IntoIterator<Item = S>,
    ) -> Result<Vec<CheckResult>> {
        self.check(ObjectType::Contact, ids).await
    }

    pub async fn check_hosts<S: Into<String>>(
        &mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Vec<CheckResult>> {
        self.check(ObjectType::Host, names).await
    }

    async fn check<S: Into<String>>(
        &mut self,
        object: ObjectType,
        names: impl IntoIterator<Item = S>,
    ) -> Result<Vec<CheckResult>> {
        let response = self.execute(Command::check(object, names)).await?;
        match response.data {
            ResponseData::Check(results) => Ok(results),
            _ => Err(self.unexpected_payload("chkData", &response)),
        }
    }

    /// Look up a domain. "Object does not exist" is [`DomainLookup::NotFound`], not an error.
    pub async fn domain_info(&mut self, name: &str) -> Result<DomainLookup> {
        self.domain_lookup(DomainInfoRequest::new(name)).await
    }

    /// Like [`domain_info`](Self::domain_info) with full control over the request.
    pub async fn domain_lookup(&mut self, request: DomainInfoRequest) -> Result<DomainLookup> {
        match self.fetch_domain(Command::domain_info(request)).await {
            Ok(info) => Ok(DomainLookup::Found(Box::new(info))),
            Err(e) if e.result_code() == Some(OBJECT_NOT_FOUND) => Ok(DomainLookup::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn fetch_domain(&mut self, command: Command) -> Result<DomainInfo> {
        let response = self.execute(command).await?;
        match response.data {
            ResponseData::DomainInfo(info) => Ok(*info),
            _ => Err(self.unexpected_payload("domain infData", &response)),
        }
    }

    /// Retrieve the domain's auth code (EPP code) for an outgoing transfer.
    pub async fn auth_code(&mut self, name: &str) -> Result<Option<String>> {
        let command = Command::domain_info(DomainInfoRequest::new(name)).with_kind(AUTH_CODE_QUERY);
        let info = self.fetch_domain(command).await?;
        Ok(info.auth_info)
    }

    pub async fn create_domain(&mut self, request: DomainCreateRequest) -> Result<DomainCreated> {
        let name = request.name.clone();
        let response = self.execute(Command::domain_create(request)).await?;
        match response.data {
            ResponseData::DomainCreated(created) => Ok(created),
            _ => {
                self.note_missing_res_data("domain creData", &response);
                Ok(DomainCreated {
                    name,
                    created_at: None,
                    expires_at: None,
                })
            }
        }
    }

    pub async fn renew_domain(&mut self, request: DomainRenewRequest) -> Result<DomainRenewed> {
        let name = request.name.clone();
        let response = self.execute(Command::domain_renew(request)).await?;
        match response.data {
            ResponseData::DomainRenewed(renewed) => Ok(renewed),
            _ => {
                self.note_missing_res_data("domain renData", &response);
                Ok(DomainRenewed {
                    name,
                    expires_at: None,
                })
            }
        }
    }

    pub async fn delete_domain(&mut self, name: &str) -> Result<()> {
        self.execute(Command::domain_delete(name)).await?;
        Ok(())
    }

    /// Start an incoming transfer.
    pub async fn request_transfer(
        &mut self,
        name: &str,
        auth_info: Option<String>,
        period: Option<Period>,
    ) -> Result<TransferInfo> {
        self.transfer(DomainTransferRequest {
            op: TransferOp::Request,
            name: name.to_string(),
            period,
            auth_info,
        })
        .await
    }

    /// Status of a pending transfer.
    pub async fn query_transfer(&mut self, name: &str) -> Result<TransferInfo> {
        self.transfer(DomainTransferRequest {
            op: TransferOp::Query,
            name: name.to_string(),
            period: None,
            auth_info: None,
        })
        .await
    }

    pub async fn transfer(&mut self, request: DomainTransferRequest) -> Result<TransferInfo> {
        let response = self.execute(Command::domain_transfer(request)).await?;
        match response.data {
            ResponseData::Transfer(info) => Ok(info),
            _ => Err(self.unexpected_payload("trnData", &response)),
        }
    }

    /// Add and remove nameservers in one update.
    pub async fn update_nameservers(
        &mut self,
        name: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<()> {
        let mut request = DomainUpdateRequest::new(name);
        request.add.nameservers = add.to_vec();
        request.remove.nameservers = remove.to_vec();
        if request.add.is_empty() && request.remove.is_empty() {
            return Ok(());
        }
        self.execute(Command::domain_update(request)).await?;
        Ok(())
    }

    /// Make the delegation exactly `nameservers`, touching only what differs.
    pub async fn replace_nameservers(&mut self, name: &str, nameservers: &[String]) -> Result<()> {
        let current = self
            .fetch_domain(Command::domain_info(DomainInfoRequest::new(name)))
            .await?
            .nameservers;
        let (add, remove) = nameserver_diff(&current, nameservers);
        if add.is_empty() && remove.is_empty() {
            log::debug!("[{}] Nameservers of {name} already up to date", self.registry());
            return Ok(());
        }
        self.update_nameservers(name, &add, &remove).await
    }

    /// Change registrant and/or add/remove admin, tech and billing contacts.
    pub async fn update_domain_contacts(
        &mut self,
        name: &str,
        registrant: Option<String>,
        add: Vec<DomainContact>,
        remove: Vec<DomainContact>,
    ) -> Result<()> {
        let mut request = DomainUpdateRequest::new(name);
        request.registrant = registrant;
        request.add.contacts = add;
        request.remove.contacts = remove;
        self.execute(Command::domain_update(request)).await?;
        Ok(())
    }

    /// Set or clear `clientTransferProhibited`.
    ///
    /// The registry's answer to a redundant change (already locked or unlocked)
    /// is returned unchanged as an error.
    pub async fn set_transfer_lock(&mut self, name: &str, locked: bool) -> Result<()> {
        let mut request = DomainUpdateRequest::new(name);
        let set = if locked {
            &mut request.add
        } else {
            &mut request.remove
        };
        set.statuses.push(status::CLIENT_TRANSFER_PROHIBITED.to_string());
        self.execute(Command::domain_update(request)).await?;
        Ok(())
    }

    // ============ Contact / Host ============

    pub async fn create_contact(&mut self, request: ContactCreateRequest) -> Result<ObjectCreated> {
        let id = request.id.clone();
        let response = self.execute(Command::contact_create(request)).await?;
        match response.data {
            ResponseData::Created(created) => Ok(created),
            _ => {
                self.note_missing_res_data("contact creData", &response);
                Ok(ObjectCreated {
                    id,
                    created_at: None,
                })
            }
        }
    }

    pub async fn contact_info(&mut self, id: &str, auth_info: Option<String>) -> Result<ContactInfo> {
        let response = self.execute(Command::contact_info(id, auth_info)).await?;
        match response.data {
            ResponseData::ContactInfo(info) => Ok(*info),
            _ => Err(self.unexpected_payload("contact infData", &response)),
        }
    }

    pub async fn update_contact(&mut self, request: ContactUpdateRequest) -> Result<()> {
        self.execute(Command::contact_update(request)).await?;
        Ok(())
    }

    pub async fn create_host(&mut self, request: HostCreateRequest) -> Result<ObjectCreated> {
        let name = request.name.clone();
        let response = self.execute(Command::host_create(request)).await?;
        match response.data {
            ResponseData::Created(created) => Ok(created),
            _ => {
                self.note_missing_res_data("host creData", &response);
                Ok(ObjectCreated {
                    id: name,
                    created_at: None,
                })
            }
        }
    }

    pub async fn host_info(&mut self, name: &str) -> Result<HostInfo> {
        let response = self.execute(Command::host_info(name)).await?;
        match response.data {
            ResponseData::HostInfo(info) => Ok(info),
            _ => Err(self.unexpected_payload("host infData", &response)),
        }
    }

    // ============ Poll ============

    /// Fetch the oldest queued message without removing it. `None` when the queue is empty.
    pub async fn poll_request(&mut self) -> Result<Option<PollMessage>> {
        let response = self.execute(Command::poll_request()).await?;
        if response.result_code == NO_MESSAGES {
            return Ok(None);
        }
        let Some(queue) = response.message_queue.clone() else {
            return Err(self.unexpected_payload("msgQ", &response));
        };
        let Some(id) = queue.id else {
            return Err(self.unexpected_payload("msgQ id", &response));
        };
        Ok(Some(PollMessage {
            id,
            count: queue.count,
            queued_at: queue.queued_at,
            message: queue.message,
            data: response.data,
        }))
    }

    /// Remove a message from the queue and return how many remain.
    pub async fn poll_ack(&mut self, message_id: &str) -> Result<u32> {
        let response = self.execute(Command::poll_ack(message_id)).await?;
        Ok(response.message_queue.map(|q| q.count).unwrap_or_default())
    }
}

/// Case-insensitive difference between the current and desired nameserver sets.
fn nameserver_diff(current: &[String], desired: &[String]) -> (Vec<String>, Vec<String>) {
    let normalize = |ns: &String| ns.trim_end_matches('.').to_ascii_lowercase();
    let current_set: HashSet<String> = current.iter().map(normalize).collect();
    let desired_set: HashSet<String> = desired.iter().map(normalize).collect();

    let add = desired
        .iter()
        .filter(|ns| !current_set.contains(&normalize(*ns)))
        .cloned()
        .collect();
    let remove = current
        .iter()
        .filter(|ns| !desired_set.contains(&normalize(*ns)))
        .cloned()
        .collect();
    (add, remove)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn diff_adds_and_removes() {
        let (add, remove) = nameserver_diff(
            &names(&["ns1.old.net", "ns2.keep.net"]),
            &names(&["ns2.keep.net", "ns3.new.net"]),
        );
        assert_eq!(add, ["ns3.new.net"]);
        assert_eq!(remove, ["ns1.old.net"]);
    }

    #[test]
    fn diff_ignores_case_and_trailing_dot() {
        let (add, remove) = nameserver_diff(
            &names(&["NS1.Example.COM"]),
            &names(&["ns1.example.com."]),
        );
        assert!(add.is_empty());
        assert!(remove.is_empty());
    }

    #[test]
    fn auth_code_kind_is_distinct_from_info() {
        assert_ne!(AUTH_CODE_QUERY, CommandKind::Info(ObjectType::Domain));
        assert!(AUTH_CODE_QUERY.requires_login());
    }
}
