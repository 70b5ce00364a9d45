//! Shared test fixtures: in-memory stores and recording port doubles.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

use btp_storage::MemoryStores;
use btp_types::{Devis, DevisConvertEvent, DevisError, RelanceDevis};

use crate::ports::{
	BudgetCreationData, ChantierCreationData, ChantierCreationPort, ConversionChantierResult,
	EventPublisher, LotBudgetaireCreationData, NotificationTransport, PdfGenerator,
};
use crate::usecases::pdf::DevisDetail;

pub fn dec(s: &str) -> Decimal {
	s.parse().unwrap()
}

pub fn stores() -> Arc<MemoryStores> {
	Arc::new(MemoryStores::new())
}

/// Chantier-creation double returning fixed identifiers.
#[derive(Default)]
pub struct FakeChantierPort {
	pub echoue: bool,
	pub appels: Mutex<Vec<(ChantierCreationData, BudgetCreationData, usize)>>,
}

#[async_trait]
impl ChantierCreationPort for FakeChantierPort {
	async fn create_chantier_from_devis(
		&self,
		chantier: ChantierCreationData,
		budget: BudgetCreationData,
		lots: Vec<LotBudgetaireCreationData>,
	) -> Result<ConversionChantierResult, DevisError> {
		if self.echoue {
			return Err(DevisError::Conversion("panne du module chantier".into()));
		}
		let nb_lots = lots.len();
		self.appels.lock().await.push((chantier, budget, nb_lots));
		Ok(ConversionChantierResult {
			chantier_id: 77,
			code_chantier: "CH-2026-077".into(),
			budget_id: 12,
			nb_lots_transferes: nb_lots as u32,
		})
	}
}

/// Event publisher double recording published events.
#[derive(Default)]
pub struct RecordingPublisher {
	pub events: Mutex<Vec<DevisConvertEvent>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
	async fn publish(&self, event: DevisConvertEvent) -> Result<(), DevisError> {
		self.events.lock().await.push(event);
		Ok(())
	}
}

/// PDF generator double returning a marker payload.
pub struct FakePdfGenerator;

#[async_trait]
impl PdfGenerator for FakePdfGenerator {
	async fn generate(&self, devis: &DevisDetail) -> Result<Vec<u8>, DevisError> {
		Ok(format!("%PDF {}", devis.numero).into_bytes())
	}
}

/// Notification transport double; optionally fails every send.
#[derive(Default)]
pub struct FakeNotificationTransport {
	pub echoue: bool,
	pub envois: Mutex<Vec<i64>>,
}

#[async_trait]
impl NotificationTransport for FakeNotificationTransport {
	async fn envoyer_relance(
		&self,
		relance: &RelanceDevis,
		_devis: &Devis,
	) -> Result<(), DevisError> {
		if self.echoue {
			return Err(DevisError::RelanceExecution("smtp indisponible".into()));
		}
		self.envois.lock().await.push(relance.id.unwrap_or_default());
		Ok(())
	}
}
