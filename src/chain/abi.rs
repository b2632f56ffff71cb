//! Solidity ABI surface consumed by the backend.
//!
//! Argument order and types match the deployed contracts exactly.

use alloy::sol;

sol! {
    /// Subset of ERC-20 used for USDC allowance handling.
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
    }
}

sol! {
    /// The deployed put-option contract.
    interface IPutOptions {
        function createPutOpt(
            uint256 strike,
            uint256 premium,
            uint256 expiry,
            address asset,
            uint256 amount
        ) external;

        function usdc() external view returns (address);

        function optCount() external view returns (uint256);

        function opts(uint256 index) external view returns (
            uint256 strike,
            uint256 premium,
            uint256 amount,
            uint256 expiry,
            address seller,
            address buyer,
            address asset,
            bool assetSent,
            bool fundSent
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolCall;

    #[test]
    fn test_selectors_match_signatures() {
        // keccak256("approve(address,uint256)")[..4]
        assert_eq!(IERC20::approveCall::SELECTOR, [0x09, 0x5e, 0xa7, 0xb3]);
        // keccak256("allowance(address,address)")[..4]
        assert_eq!(IERC20::allowanceCall::SELECTOR, [0xdd, 0x62, 0xed, 0x3e]);
        assert_eq!(
            IPutOptions::createPutOptCall::SIGNATURE,
            "createPutOpt(uint256,uint256,uint256,address,uint256)"
        );
    }

    #[test]
    fn test_allowance_calldata_layout() {
        let owner = Address::repeat_byte(0xaa);
        let spender = Address::repeat_byte(0xbb);
        let data = IERC20::allowanceCall { owner, spender }.abi_encode();

        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &IERC20::allowanceCall::SELECTOR);
        // Addresses are left-padded to 32 bytes
        assert_eq!(&data[16..36], owner.as_slice());
        assert_eq!(&data[48..68], spender.as_slice());
    }

    #[test]
    fn test_create_put_opt_argument_order() {
        let call = IPutOptions::createPutOptCall {
            strike: U256::from(1u64),
            premium: U256::from(2u64),
            expiry: U256::from(3u64),
            asset: Address::repeat_byte(0x11),
            amount: U256::from(4u64),
        };
        let data = call.abi_encode();

        assert_eq!(data[4 + 31], 1);
        assert_eq!(data[4 + 63], 2);
        assert_eq!(data[4 + 95], 3);
        assert_eq!(&data[4 + 108..4 + 128], Address::repeat_byte(0x11).as_slice());
        assert_eq!(data[4 + 159], 4);
    }
}
